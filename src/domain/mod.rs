pub mod clock;
pub mod event;
pub mod game;
pub mod lineup;
pub mod rows;

pub use clock::*;
pub use event::*;
pub use game::*;
pub use lineup::*;
pub use rows::*;
