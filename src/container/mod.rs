pub mod launcher;
pub mod watcher;

pub use launcher::ContainerLauncher;
pub use watcher::CompletionWatcher;
