use tokio::runtime::Handle;

use crate::{Config, Result, Session, catalog::MetaUnitCatalog};

#[derive(Default)]
pub struct SessionBuilder {
    config: Config,
    catalog: MetaUnitCatalog,
    runtime: Option<Handle>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(
        mut self,
        config: Config,
    ) -> Self {
        self.config = config;
        self
    }

    /// Loads the config from a TOML file.
    pub fn config_file(
        mut self,
        path: &str,
    ) -> Result<Self> {
        self.config = Config::create(path)?;
        Ok(self)
    }

    pub fn catalog(
        mut self,
        catalog: MetaUnitCatalog,
    ) -> Self {
        self.catalog = catalog;
        self
    }

    /// Runtime used by [`Session::attach`], defaults to the current one.
    pub fn runtime(
        mut self,
        runtime: Handle,
    ) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Session> {
        let session = Session::new_with_config(self.config, self.catalog);
        let session = match self.runtime {
            Some(handle) => session.with_runtime(handle),
            None => session,
        };

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{PipecacheError, sync::MemRemote};

    #[test]
    fn test_build_with_catalog() {
        let catalog = MetaUnitCatalog::from_json(r#"[{ "id": 1, "inPorts": [], "outPorts": ["out1"] }]"#).unwrap();
        let session = SessionBuilder::new().config(Config::load_from_str("event_queue_size = 8").unwrap()).catalog(catalog).build().unwrap();
        assert_eq!(session.catalog().len(), 1);
        assert!(session.units().is_empty());
    }

    #[test]
    fn test_build_with_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let session = SessionBuilder::new().runtime(runtime.handle().clone()).build().unwrap();

        // attach works outside of the runtime context
        let transport = session.attach(Arc::new(MemRemote::new())).unwrap();
        session.shutdown();
        runtime.block_on(transport).unwrap();
    }

    #[test]
    fn test_missing_config_file() {
        let err = SessionBuilder::new().config_file("/nonexistent/pipecache.toml").err().unwrap();
        assert!(matches!(err, PipecacheError::IoError(_)));
    }
}
