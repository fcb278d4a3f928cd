pub mod chrome;
pub mod scripts;
pub mod viewer;

pub use chrome::{ChromeDriver, ConnectionMode};
pub use viewer::ChromeViewer;
