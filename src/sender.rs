//! 微信消息发送器 (macOS) - 通过 AppleScript 操作微信客户端
//!
//! 与接收管道互不依赖：由 hook 的消费方触发，接收侧从不调用。
//!
//! 发送流程：
//! 1. 内容写入剪贴板（pbcopy）
//! 2. 退出所有全屏窗口，激活微信
//! 3. 按名称找到目标聊天窗口并全屏
//! 4. 点击输入框，粘贴，回车
//! 5. 如之前未全屏，退出全屏

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// 外发消息接口
pub trait MessageSender {
    /// 把内容发到指定会话，成功返回 true
    fn send(&self, content: &str, target: &str) -> bool;
}

/// 发送器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// 微信进程名
    pub process_name: String,
    /// 全屏后输入框的屏幕坐标
    pub input_box: (u32, u32),
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            process_name: "WeChat".to_string(),
            // 基于 2560x1440，输入框在底部中央
            input_box: (1280, 1350),
        }
    }
}

/// AppleScript 发送器
#[derive(Debug, Clone, Default)]
pub struct AppleScriptSender {
    config: SenderConfig,
}

impl AppleScriptSender {
    pub fn new(config: SenderConfig) -> Self {
        Self { config }
    }

    /// 设置剪贴板内容
    fn set_clipboard(&self, text: &str) -> Result<()> {
        let mut child = Command::new("pbcopy")
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| anyhow!("Failed to run pbcopy: {}", e))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(text.as_bytes())?;
        }

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow!("pbcopy exited with {}", status))
        }
    }

    fn run_applescript(&self, script: &str) -> Result<String> {
        let output = Command::new("osascript").args(["-e", script]).output()?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(anyhow!(
                "osascript failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        }
    }

    /// 发送并返回具体失败原因
    pub fn try_send(&self, content: &str, target: &str) -> Result<()> {
        if target.trim().is_empty() {
            return Err(anyhow!("target conversation is empty"));
        }

        self.set_clipboard(content)?;
        let script = build_send_script(&self.config, target);
        let output = self.run_applescript(&script)?;

        // 脚本内部找不到窗口时返回 "ERROR: ..."
        if let Some(reason) = output.strip_prefix("ERROR:") {
            return Err(anyhow!("{}", reason.trim()));
        }
        Ok(())
    }
}

impl MessageSender for AppleScriptSender {
    fn send(&self, content: &str, target: &str) -> bool {
        let preview: String = content.chars().take(50).collect();
        debug!(target = %target, preview = %preview, "Sending message via WeChat UI");

        match self.try_send(content, target) {
            Ok(()) => {
                info!(target = %target, "Message sent");
                true
            }
            Err(e) => {
                error!(target = %target, error = %e, "Failed to send message");
                false
            }
        }
    }
}

/// 转义 AppleScript 字符串字面量
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// 生成发送脚本
pub fn build_send_script(config: &SenderConfig, target: &str) -> String {
    let process = escape_applescript(&config.process_name);
    let target = escape_applescript(target.trim());
    let (x, y) = config.input_box;

    format!(
        r#"
tell application "System Events"
    tell process "{process}"
        try
            repeat with w in every window
                try
                    if value of attribute "AXFullScreen" of w then
                        set value of attribute "AXFullScreen" of w to false
                        delay 0.3
                    end if
                end try
            end repeat
        end try
    end tell
end tell
delay 0.5
tell application "{process}" to activate
delay 0.5

set targetName to "{target}"
set wasFullscreen to false
tell application "System Events"
    tell process "{process}"
        set targetWindow to missing value
        repeat with w in every window
            try
                set winName to name of w
                set trimmedName to do shell script "echo " & quoted form of winName & " | sed 's/^[ ]*//;s/[ ]*$//'"
                if trimmedName is targetName then
                    set targetWindow to w
                    exit repeat
                end if
            end try
        end repeat
        if targetWindow is missing value then
            return "ERROR: window not found " & targetName
        end if

        perform action "AXRaise" of targetWindow
        delay 0.5
        try
            set wasFullscreen to value of attribute "AXFullScreen" of targetWindow
        end try
        click targetWindow
        delay 0.5
        if not wasFullscreen then
            set value of attribute "AXFullScreen" of targetWindow to true
            delay 1.0
        end if
        click targetWindow
        delay 0.8

        click at {{{x}, {y}}}
        delay 0.5
        keystroke "v" using command down
        delay 0.5
        key code 36
        delay 0.5

        if not wasFullscreen then
            key code 53
            delay 0.5
        end if
    end tell
end tell
return "OK"
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_applescript() {
        assert_eq!(escape_applescript(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[test]
    fn test_build_send_script_targets_window() {
        let script = build_send_script(&SenderConfig::default(), " Mwu！ ");
        assert!(script.contains(r#"set targetName to "Mwu！""#));
        assert!(script.contains(r#"tell process "WeChat""#));
        assert!(script.contains("click at {1280, 1350}"));
        assert!(script.contains("key code 36"));
    }

    #[test]
    fn test_build_send_script_escapes_target() {
        let script = build_send_script(&SenderConfig::default(), r#"evil" & do shell script "x"#);
        assert!(script.contains(r#"set targetName to "evil\" & do shell script \"x""#));
    }

    #[test]
    fn test_empty_target_rejected() {
        let sender = AppleScriptSender::default();
        let err = sender.try_send("hello", "  ").unwrap_err();
        assert!(err.to_string().contains("target"));
    }
}
