pub use super::media::Entity as Media;
