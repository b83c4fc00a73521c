pub mod image;
pub mod network;

pub use image::ImageResolver;
pub use network::NetworkProvisioner;
