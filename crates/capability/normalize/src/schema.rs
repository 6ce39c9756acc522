//! 节点解析规则解析与缓存

use crate::layout::{Layout, LayoutError, normalize_rule};
use domain::NodeId;
use oem_config::{NodeSettings, parser_rule_key, parser_var_names_key, parser_var_scalers_key};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 解析规则错误（配置存在但无法解析）。
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid layout '{rule}' for node {node_id}: {source}")]
    InvalidLayout {
        node_id: NodeId,
        rule: String,
        source: LayoutError,
    },
    #[error("invalid scaler '{value}' for node {node_id}")]
    InvalidScale { node_id: NodeId, value: String },
}

/// 节点的完整解析规则。
#[derive(Debug, Clone)]
pub struct Schema {
    pub layout: Arc<Layout>,
    pub names: Arc<[String]>,
    pub scales: Arc<[f64]>,
}

/// 节点解析规则解析器。
///
/// 布局、字段名、缩放系数三者各自按节点 ID 缓存，首次解析成功后在进程生命周期内不再读取配置。
pub struct SchemaResolver {
    settings: Arc<dyn NodeSettings>,
    layouts: HashMap<NodeId, Arc<Layout>>,
    names: HashMap<NodeId, Arc<[String]>>,
    scales: HashMap<NodeId, Arc<[f64]>>,
}

impl SchemaResolver {
    pub fn new(settings: Arc<dyn NodeSettings>) -> Self {
        Self {
            settings,
            layouts: HashMap::new(),
            names: HashMap::new(),
            scales: HashMap::new(),
        }
    }

    /// 解析节点规则；任一配置缺失时返回 `Ok(None)`（未配置节点）。
    pub fn resolve(&mut self, node_id: NodeId) -> Result<Option<Schema>, SchemaError> {
        let Some(layout) = self.layout(node_id)? else {
            debug!(target: "oem.normalize", node_id, "layout not configured");
            return Ok(None);
        };
        let Some(names) = self.names(node_id) else {
            debug!(target: "oem.normalize", node_id, "variable names not configured");
            return Ok(None);
        };
        let Some(scales) = self.scales(node_id)? else {
            debug!(target: "oem.normalize", node_id, "variable scalers not configured");
            return Ok(None);
        };
        Ok(Some(Schema {
            layout,
            names,
            scales,
        }))
    }

    fn layout(&mut self, node_id: NodeId) -> Result<Option<Arc<Layout>>, SchemaError> {
        if let Some(layout) = self.layouts.get(&node_id) {
            return Ok(Some(layout.clone()));
        }
        let Some(raw) = self.settings.get(&parser_rule_key(node_id)) else {
            return Ok(None);
        };
        let rule = normalize_rule(&raw);
        let layout = Layout::parse(&rule).map_err(|source| SchemaError::InvalidLayout {
            node_id,
            rule: rule.clone(),
            source,
        })?;
        debug!(target: "oem.normalize", node_id, rule = %rule, "layout resolved");
        let layout = Arc::new(layout);
        self.layouts.insert(node_id, layout.clone());
        Ok(Some(layout))
    }

    fn names(&mut self, node_id: NodeId) -> Option<Arc<[String]>> {
        if let Some(names) = self.names.get(&node_id) {
            return Some(names.clone());
        }
        let raw = self.settings.get(&parser_var_names_key(node_id))?;
        let names: Arc<[String]> = split_list(&raw).into();
        debug!(target: "oem.normalize", node_id, names = ?names, "variable names resolved");
        self.names.insert(node_id, names.clone());
        Some(names)
    }

    fn scales(&mut self, node_id: NodeId) -> Result<Option<Arc<[f64]>>, SchemaError> {
        if let Some(scales) = self.scales.get(&node_id) {
            return Ok(Some(scales.clone()));
        }
        let Some(raw) = self.settings.get(&parser_var_scalers_key(node_id)) else {
            return Ok(None);
        };
        let scales = split_list(&raw)
            .into_iter()
            .map(|value| {
                value
                    .parse::<f64>()
                    .map_err(|_| SchemaError::InvalidScale { node_id, value })
            })
            .collect::<Result<Arc<[f64]>, _>>()?;
        debug!(target: "oem.normalize", node_id, scales = ?scales, "variable scalers resolved");
        self.scales.insert(node_id, scales.clone());
        Ok(Some(scales))
    }
}

/// 去掉所有空格后按逗号拆分。
fn split_list(raw: &str) -> Vec<String> {
    raw.replace(' ', "").split(',').map(str::to_string).collect()
}
