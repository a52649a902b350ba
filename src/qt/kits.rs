//! Build-kit descriptions for CMake front ends, one per installation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::QtError;
use crate::model::installation::Installation;
use crate::qt::toolchain::{ToolLocator, locate_toolchain_file};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CMakeKit {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain_file: Option<PathBuf>,
    pub environment_variables: BTreeMap<String, String>,
    pub preferred_generator: Generator,
    pub cmake_settings: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generator {
    pub name: String,
}

pub fn kit_for(installation: &Installation, tools: &ToolLocator) -> CMakeKit {
    let environment = tools.compose(installation);

    let mut environment_variables = BTreeMap::new();
    environment_variables.insert("PATH".to_string(), environment.path_string());

    let mut cmake_settings = BTreeMap::new();
    cmake_settings.insert(
        "CMAKE_MAKE_PROGRAM".to_string(),
        environment.ninja.display().to_string(),
    );

    CMakeKit {
        name: installation.kit_name(),
        toolchain_file: locate_toolchain_file(installation),
        environment_variables,
        preferred_generator: Generator {
            name: "Ninja".to_string(),
        },
        cmake_settings,
    }
}

pub fn kits_json(installations: &[Installation], tools: &ToolLocator) -> Result<String, QtError> {
    if installations.is_empty() {
        return Err(QtError::NotConfigured);
    }

    let kits: Vec<CMakeKit> = installations
        .iter()
        .map(|installation| kit_for(installation, tools))
        .collect();
    Ok(serde_json::to_string_pretty(&kits)?)
}

pub fn find_by_kit_name<'a>(
    installations: &'a [Installation],
    kit_name: &str,
) -> Option<&'a Installation> {
    installations
        .iter()
        .find(|installation| installation.kit_name() == kit_name)
}
