//! 持久化消息队列
//!
//! 只追加的文本日志，每行一条记录。写入（门户阶段）与读取/清空（同步阶段）
//! 在时间上互斥，由 `ModeController` 保证，这里不加锁。

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug)]
pub struct MessageQueue {
    path: PathBuf,
}

impl MessageQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一行，写完立即关闭文件
    pub fn append(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{}", line)?;
        f.flush()?;
        Ok(())
    }

    /// 按写入顺序惰性读取所有行；文件不存在或不可读时返回空序列
    ///
    /// 非 UTF-8 字节按有损方式解码，坏行不会截断后面的记录。
    pub fn read_all(&self) -> QueueLines {
        let reader = match File::open(&self.path) {
            Ok(f) => Some(BufReader::new(f)),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("Queue {:?} unreadable, treating as empty: {}", self.path, e);
                None
            }
        };
        QueueLines {
            reader,
            aborted: false,
        }
    }

    pub fn len(&self) -> usize {
        self.read_all().count()
    }

    pub fn is_empty(&self) -> bool {
        self.read_all().next().is_none()
    }

    /// 删除队列文件；文件本就不存在时不算错误
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// 用给定的行整体替换队列内容（先写临时文件再改名）
    ///
    /// 只在 `WipePolicy::RetainFailed` 下使用；行为空时等同于 `clear`。
    pub fn retain(&self, lines: &[String]) -> Result<()> {
        if lines.is_empty() {
            return self.clear();
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut f = File::create(&tmp)?;
            for line in lines {
                writeln!(f, "{}", line)?;
            }
            f.flush()?;
        }
        // SPIFFS 上 rename 不会覆盖已有文件
        self.clear()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// `MessageQueue::read_all` 返回的行迭代器
pub struct QueueLines {
    reader: Option<BufReader<File>>,
    aborted: bool,
}

impl QueueLines {
    /// 读取过程中遇到 I/O 错误，后面可能还有未读出的记录
    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl Iterator for QueueLines {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let reader = self.reader.as_mut()?;
        let mut buf = Vec::new();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                self.reader = None;
                None
            }
            Ok(_) => {
                if buf.last() == Some(&b'\n') {
                    buf.pop();
                }
                Some(String::from_utf8_lossy(&buf).into_owned())
            }
            Err(e) => {
                log::warn!("Queue read aborted: {}", e);
                self.reader = None;
                self.aborted = true;
                None
            }
        }
    }
}
