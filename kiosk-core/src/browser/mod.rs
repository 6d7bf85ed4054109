mod chromium;
mod controller;
mod error;
mod proxy;

pub use chromium::ChromiumController;
pub use controller::{BrowserController, LaunchSpec, PageInfo};
pub use error::{BrowserError, BrowserResult};
pub use proxy::{pick_user_agent, ProxyRotator, FALLBACK_USER_AGENT};
