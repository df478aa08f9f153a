//! 队列记录
//!
//! 持久化格式为每行一条 `"<name>: <message>"`。解析时按第一个 `:` 切分，
//! 消息从分隔符后再跳过一个字符开始。name 中若含有 `:` 会导致切分错位，
//! 这是旧格式的已知限制，为了兼容保持不变。

use serde::Serialize;

/// 少于该长度的行视为损坏，上传时跳过
pub const MIN_LINE_LEN: usize = 3;

const DELIMITER: char = ':';

/// 上传到远端的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub name: String,
    pub message: String,
}

impl Record {
    /// 由表单字段构造记录，换行符替换为空格，保证一条记录只占一行
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: single_line(name),
            message: single_line(message),
        }
    }

    /// 解析一行持久化数据；过短的行返回 `None`
    pub fn parse_line(line: &str) -> Option<Self> {
        // 旧固件用 println 写入 CRLF，长度判断包含 '\r'
        if line.len() < MIN_LINE_LEN {
            return None;
        }
        let line = line.strip_suffix('\r').unwrap_or(line);

        let Some(split) = line.find(DELIMITER) else {
            return Some(Self {
                name: line.to_string(),
                message: String::new(),
            });
        };

        let name = &line[..split];
        let mut rest = line[split + DELIMITER.len_utf8()..].chars();
        // 跳过分隔符后的一个字符（通常是空格）
        rest.next();

        Some(Self {
            name: name.to_string(),
            message: rest.as_str().to_string(),
        })
    }

    /// 生成持久化行（不含行结束符）
    pub fn to_line(&self) -> String {
        format!("{}{} {}", self.name, DELIMITER, self.message)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}
