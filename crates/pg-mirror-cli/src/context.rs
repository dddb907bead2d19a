use pg_mirror_core::history::{self, HistoryStore};

#[derive(Debug, Clone)]
pub struct AppContext {
    pub verbose: bool,
    pub history: Option<HistoryStore>,
}

impl AppContext {
    pub fn load(verbose: bool) -> Self {
        let history = if history::history_disabled() {
            None
        } else {
            match HistoryStore::default_location() {
                Ok(store) => Some(store),
                Err(err) => {
                    log::warn!("failed to resolve history location (history disabled): {err:?}");
                    None
                }
            }
        };
        Self { verbose, history }
    }
}
