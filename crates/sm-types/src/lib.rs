pub mod constraint;
pub mod errors;
pub mod objective;
pub mod parameter;
pub mod recommendation;
pub mod scale;

pub use constraint::*;
pub use errors::*;
pub use objective::*;
pub use parameter::*;
pub use recommendation::*;
pub use scale::*;
