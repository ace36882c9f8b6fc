//! User-facing notices with retry callbacks.

use std::sync::Mutex;

type RetryFn = Box<dyn Fn() + Send + Sync>;

pub struct Notice {
    text: String,
    retry: Option<RetryFn>,
}

impl Notice {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            retry: None,
        }
    }

    pub fn with_retry(text: impl Into<String>, retry: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            text: text.into(),
            retry: Some(Box::new(retry)),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Invokes the retry callback, if any.
    pub fn retry(&self) {
        if let Some(retry) = &self.retry {
            retry();
        }
    }
}

/// Shared notice list. `set` replaces all prior notices, `add` accumulates.
#[derive(Default)]
pub struct Messages {
    notices: Mutex<Vec<Notice>>,
}

impl Messages {
    pub fn set(&self, notice: Notice) {
        *self.notices.lock().unwrap() = vec![notice];
    }

    #[allow(dead_code)]
    pub fn add(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }

    pub fn clear(&self) {
        self.notices.lock().unwrap().clear();
    }

    /// Removes and returns all pending notices.
    pub fn take(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.notices.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
