pub mod case;
pub mod chapter;
pub mod locale;
pub mod node;
