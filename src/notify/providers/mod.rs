//! Concrete notification provider implementations.

mod desktop;
mod telegram;

pub use desktop::DesktopProvider;
pub use telegram::TelegramProvider;
