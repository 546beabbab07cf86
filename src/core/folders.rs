use once_cell::sync::Lazy;
use std::sync::Arc;

pub static HOME_DIR: Lazy<Arc<str>> = Lazy::new(|| {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USER").map(|user| format!("/home/{}", user)))
        .map(Arc::from)
        .unwrap_or_else(|_| Arc::from("."))
});

pub static CONFIG_DIR: Lazy<Arc<str>> = Lazy::new(|| {
    std::env::var("XDG_CONFIG_HOME")
        .map(Arc::from)
        .unwrap_or_else(|_| Arc::from(format!("{}/.config", HOME_DIR.as_ref())))
});
