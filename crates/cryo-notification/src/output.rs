//! 스트리밍 조각 출력.

use std::io::{self, Write};
use std::sync::Mutex;

use cryo_core::FragmentOutput;

/// 조각을 도착 즉시 쓰고 flush하는 출력. 기본 대상은 stdout입니다.
pub struct StdoutFragments<W = io::Stdout> {
    writer: Mutex<W>,
}

impl StdoutFragments {
    /// stdout에 쓰는 출력을 생성합니다.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for StdoutFragments {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> StdoutFragments<W> {
    /// 임의의 writer에 쓰는 출력을 생성합니다.
    pub fn with_writer(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// 내부 writer를 돌려받습니다.
    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> FragmentOutput for StdoutFragments<W> {
    fn forward(&self, fragment: &str) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "출력 잠금 실패"))?;
        writer.write_all(fragment.as_bytes())?;
        writer.flush()
    }
}
