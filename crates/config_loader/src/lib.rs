//! # Config Loader
//!
//! 读取 TOML / JSON 管道配置，校验后得到 [`PipelineBlueprint`]。
//!
//! ```no_run
//! # fn main() -> Result<(), contracts::ContractError> {
//! let blueprint = config_loader::ConfigLoader::load_from_path("config.toml".as_ref())?;
//! assert!(blueprint.enabled_operator_count() > 0);
//! # Ok(())
//! # }
//! ```

mod parser;
mod validator;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;

use std::path::Path;

use contracts::ContractError;

pub struct ConfigLoader;

impl ConfigLoader {
    /// 按扩展名 (.toml / .json) 选择解析器
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ConfigFormat::from_extension)
            .ok_or_else(|| ContractError::UnsupportedFormat {
                path: path.to_path_buf(),
            })?;
        let raw = std::fs::read_to_string(path).map_err(|source| ContractError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_from_str(&raw, format)
    }

    /// 解析后立即校验；非法取值不会进入 blueprint
    pub fn load_from_str(
        raw: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = parser::parse(raw, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }

    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint).map_err(|e| ContractError::serialize("TOML", e))
    }

    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint).map_err(|e| ContractError::serialize("JSON", e))
    }
}
