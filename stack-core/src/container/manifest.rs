use crate::{Result, StackError};
use std::fs;
use std::path::{Path, PathBuf};

/// 确认所有编排文件都存在
pub fn ensure_exists(files: &[PathBuf]) -> Result<()> {
    if files.is_empty() {
        return Err(StackError::invalid_config("没有指定编排文件"));
    }
    match files.iter().find(|file| !file.is_file()) {
        Some(missing) => Err(StackError::ManifestNotFound(missing.clone())),
        None => Ok(()),
    }
}

/// 读取在当前启用的 profile 下会被启动的服务名，多个文件按顺序合并去重
///
/// 没有 `profiles` 的服务总会启动；带 `profiles` 的服务只有其中之一被启用时才启动，
/// `*` 启用全部。后面的文件中重新声明的 `profiles` 覆盖前面的。
pub fn service_names(files: &[PathBuf], active_profiles: &[String]) -> Result<Vec<String>> {
    let mut declared: Vec<(String, Vec<String>)> = Vec::new();
    for file in files {
        for (name, profiles) in services_in(file)? {
            match declared.iter_mut().find(|(known, _)| *known == name) {
                Some(entry) => {
                    if let Some(profiles) = profiles {
                        entry.1 = profiles;
                    }
                }
                None => declared.push((name, profiles.unwrap_or_default())),
            }
        }
    }

    let all_enabled = active_profiles.iter().any(|p| p == "*");
    Ok(declared
        .into_iter()
        .filter(|(_, profiles)| {
            all_enabled
                || profiles.is_empty()
                || profiles.iter().any(|p| active_profiles.contains(p))
        })
        .map(|(name, _)| name)
        .collect())
}

/// 服务名及其 `profiles`（未声明时为 None）
fn services_in(file: &Path) -> Result<Vec<(String, Option<Vec<String>>)>> {
    let content = fs::read_to_string(file).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            StackError::ManifestNotFound(file.to_path_buf())
        } else {
            StackError::Io(e)
        }
    })?;

    let yaml: serde_yaml::Value = serde_yaml::from_str(&content)?;

    // 覆盖文件可以没有 services 部分
    let Some(services) = yaml.get("services").and_then(|v| v.as_mapping()) else {
        return Ok(Vec::new());
    };

    Ok(services
        .iter()
        .filter_map(|(key, body)| {
            let name = key.as_str()?.to_string();
            let profiles = body.get("profiles").and_then(|v| v.as_sequence()).map(|seq| {
                seq.iter()
                    .filter_map(|p| p.as_str())
                    .map(str::to_string)
                    .collect()
            });
            Some((name, profiles))
        })
        .collect())
}
