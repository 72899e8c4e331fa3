use crate::app::CliApp;
use anyhow::{Context, Result};
use stack_core::state::read_state;

/// 以 JSON 输出状态文件内容
pub fn show_state(app: &CliApp) -> Result<()> {
    let state_file = app.state_file();
    let state = read_state(&state_file)
        .with_context(|| format!("读取状态文件失败: {}", state_file.display()))?;
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
