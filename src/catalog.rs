//! Catalog of unit templates ("meta units").
//!
//! A template describes the input and output ports a kind of unit offers. The
//! catalog is loaded once at startup and never changes during a session.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tracing::trace;

use crate::{PipecacheError, Result, model::MetaUnitModel};

/// meta unit id
pub type MetaUnitId = String;

/// Immutable description of a unit kind's ports.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaUnitTemplate {
    id: MetaUnitId,
    name: String,
    in_ports: Vec<String>,
    out_ports: Vec<String>,
}

impl MetaUnitTemplate {
    pub fn new(model: MetaUnitModel) -> Result<Self> {
        if model.id.is_empty() {
            return Err(PipecacheError::Validation("missing id in meta unit".into()));
        }
        unique_ports(&model.id, "input", &model.in_ports)?;
        unique_ports(&model.id, "output", &model.out_ports)?;

        Ok(Self {
            id: model.id,
            name: model.name,
            in_ports: model.in_ports,
            out_ports: model.out_ports,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn in_ports(&self) -> &[String] {
        &self.in_ports
    }

    pub fn out_ports(&self) -> &[String] {
        &self.out_ports
    }

    pub fn has_in_port(
        &self,
        port: &str,
    ) -> bool {
        self.in_ports.iter().any(|p| p == port)
    }

    pub fn has_out_port(
        &self,
        port: &str,
    ) -> bool {
        self.out_ports.iter().any(|p| p == port)
    }
}

fn unique_ports(
    id: &str,
    side: &str,
    ports: &[String],
) -> Result<()> {
    let mut seen = HashSet::new();
    for port in ports {
        if !seen.insert(port.as_str()) {
            return Err(PipecacheError::Validation(format!("meta unit {} has duplicated {} port {}", id, side, port)));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct MetaUnitCatalog {
    templates: HashMap<MetaUnitId, Arc<MetaUnitTemplate>>,
}

impl MetaUnitCatalog {
    /// Builds the catalog from the templates served at startup.
    pub fn load(models: Vec<MetaUnitModel>) -> Result<Self> {
        let mut templates = HashMap::with_capacity(models.len());
        for model in models {
            let template = MetaUnitTemplate::new(model)?;
            trace!("catalog::load({})", template.id);
            if templates.contains_key(&template.id) {
                return Err(PipecacheError::Validation(format!("duplicated meta unit id {}", template.id)));
            }
            templates.insert(template.id.clone(), Arc::new(template));
        }
        Ok(Self {
            templates,
        })
    }

    /// Builds the catalog from a JSON array of meta units.
    pub fn from_json(s: &str) -> Result<Self> {
        Self::load(MetaUnitModel::list_from_json(s)?)
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Result<Arc<MetaUnitTemplate>> {
        self.templates.get(id).cloned().ok_or(PipecacheError::NotFound(format!("meta unit {}", id)))
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.templates.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MetaUnitTemplate>> {
        self.templates.values()
    }
}
