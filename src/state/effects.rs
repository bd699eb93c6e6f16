use std::{fmt, sync::Arc};

use serde::Serialize;

/// Side effects the state layer asks the view layer to perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEffect {
    ScrollAnswersToTop,
    RevealAnswer { answer_id: String },
    Notify { code: String, message: String },
}

type Listener = Arc<dyn Fn(&UiEffect) + Send + Sync>;

/// Fan-out of [`UiEffect`]s to a registered listener. Without a listener,
/// effects are dropped.
#[derive(Clone, Default)]
pub struct EffectSink {
    listener: Option<Listener>,
}

impl fmt::Debug for EffectSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectSink")
            .field("has_listener", &self.listener.is_some())
            .finish()
    }
}

impl EffectSink {
    pub fn new<F>(listener: F) -> Self
    where
        F: Fn(&UiEffect) + Send + Sync + 'static,
    {
        Self {
            listener: Some(Arc::new(listener)),
        }
    }

    pub fn emit(&self, effect: UiEffect) {
        if let Some(listener) = &self.listener {
            listener(&effect);
        }
    }
}
