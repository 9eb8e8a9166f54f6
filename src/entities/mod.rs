pub mod prelude;

pub mod media;
