pub mod autoscroll;
pub mod editor;
pub mod editor_window;
pub mod gesture;
pub mod history;
pub mod timer;
