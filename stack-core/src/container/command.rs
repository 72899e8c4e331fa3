//! 编排命令的参数构造
//!
//! 所有函数只负责拼装参数，不执行命令；`prefix` 为方言探测得到的前缀
//! （`docker compose` 或 `docker-compose`）。

use super::types::{LogsConfig, StartConfig};
use crate::constants::compose;

fn with_project(prefix: &[String], project_name: &str) -> Vec<String> {
    let mut args = prefix.to_vec();
    args.push("-p".to_string());
    args.push(project_name.to_string());
    args
}

/// `<prefix> -f a.yml -f b.yml --env-file .env -p <project> --profile x up -d`
pub fn build_up_args(prefix: &[String], config: &StartConfig) -> Vec<String> {
    let mut args = prefix.to_vec();
    for file in &config.compose_files {
        args.push("-f".to_string());
        args.push(file.to_string_lossy().to_string());
    }
    for env_file in &config.env_files {
        args.push("--env-file".to_string());
        args.push(env_file.to_string_lossy().to_string());
    }
    args.push("-p".to_string());
    args.push(config.project_name.clone());
    for profile in &config.profiles {
        args.push("--profile".to_string());
        args.push(profile.clone());
    }
    args.push("up".to_string());
    args.push("-d".to_string());
    args
}

/// `<prefix> -p <project> down --remove-orphans [--volumes]`
pub fn build_down_args(prefix: &[String], project_name: &str, remove_volumes: bool) -> Vec<String> {
    let mut args = with_project(prefix, project_name);
    args.push("down".to_string());
    args.push("--remove-orphans".to_string());
    if remove_volumes {
        args.push("--volumes".to_string());
    }
    args
}

/// `<prefix> -p <project> ps --all --format json`
pub fn build_ps_args(prefix: &[String], project_name: &str) -> Vec<String> {
    let mut args = with_project(prefix, project_name);
    args.extend(["ps", "--all", "--format", "json"].map(String::from));
    args
}

/// `<prefix> -p <project> logs --no-color --tail N [--follow] [--timestamps] [服务...]`
pub fn build_logs_args(prefix: &[String], project_name: &str, logs: &LogsConfig) -> Vec<String> {
    let mut args = with_project(prefix, project_name);
    args.push("logs".to_string());
    args.push("--no-color".to_string());
    args.push("--tail".to_string());
    args.push(logs.effective_tail().to_string());
    if logs.follow {
        args.push("--follow".to_string());
    }
    if logs.timestamps {
        args.push("--timestamps".to_string());
    }
    args.extend(logs.services.iter().cloned());
    args
}

/// `<prefix> version`
pub fn build_version_args(prefix: &[String]) -> Vec<String> {
    let mut args = prefix.to_vec();
    args.push(compose::VERSION_SUBCOMMAND.to_string());
    args
}

/// 按容器名查找项目的全部容器（含已退出的）
pub fn build_lookup_by_name_args(project_name: &str) -> Vec<String> {
    vec![
        compose::DOCKER_PROGRAM.to_string(),
        "ps".to_string(),
        "-aq".to_string(),
        "--filter".to_string(),
        format!("name={project_name}"),
    ]
}

/// 按 compose 项目标签查找容器，不依赖容器名
pub fn build_lookup_by_label_args(project_name: &str) -> Vec<String> {
    vec![
        compose::DOCKER_PROGRAM.to_string(),
        "ps".to_string(),
        "-aq".to_string(),
        "--filter".to_string(),
        format!("label={}={project_name}", compose::PROJECT_LABEL),
    ]
}

/// `docker rm -f -v <id>...`
pub fn build_force_remove_args(container_ids: &[String]) -> Vec<String> {
    let mut args = vec![
        compose::DOCKER_PROGRAM.to_string(),
        "rm".to_string(),
        "-f".to_string(),
        "-v".to_string(),
    ];
    args.extend(container_ids.iter().cloned());
    args
}

/// 列出项目创建的网络名
pub fn build_network_list_args(project_name: &str) -> Vec<String> {
    vec![
        compose::DOCKER_PROGRAM.to_string(),
        "network".to_string(),
        "ls".to_string(),
        "--filter".to_string(),
        format!("label={}={project_name}", compose::PROJECT_LABEL),
        "--format".to_string(),
        "{{.Name}}".to_string(),
    ]
}
