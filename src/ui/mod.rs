// Control surface and status display. Both are optional collaborators:
// the core runs identically headless.
pub mod display;
pub mod console;
