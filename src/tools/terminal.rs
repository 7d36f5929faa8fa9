//! 暫停／繼續按鍵偵測
//!
//! 掃描迴圈每個影格呼叫一次 [`PauseControl::step`]，以非阻塞方式讀取按鍵，
//! 不另外開執行緒。終端機 raw mode 只在第一次讀取按鍵時啟用，
//! 並由 [`RawModeGuard`] 在離開時還原。

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use log::{debug, warn};
use std::io::{self, IsTerminal};
use std::time::Duration;

/// 預設的暫停鍵
pub const PAUSE_KEY: char = 'p';

/// 暫停期間每次檢查之間的等待時間
pub const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 持有期間終端機處於 raw mode，drop 時還原
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        debug!("終端機切換為 raw mode");
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        match terminal::disable_raw_mode() {
            Ok(()) => debug!("終端機已還原"),
            Err(e) => warn!("無法還原終端機模式: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    /// raw mode 下 Ctrl+C 不會產生訊號，只會是一個按鍵
    Interrupt,
}

/// 非阻塞按鍵來源
pub trait KeySource {
    fn poll_key(&mut self) -> Option<KeyInput>;

    /// 釋放終端機資源，下一次 `poll_key` 會重新取得
    fn release(&mut self) {}
}

/// 沒有終端機時使用，永遠不會有按鍵
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll_key(&mut self) -> Option<KeyInput> {
        None
    }
}

pub struct TerminalKeys {
    guard: Option<RawModeGuard>,
    available: bool,
}

impl TerminalKeys {
    #[must_use]
    pub fn new() -> Self {
        Self {
            guard: None,
            available: io::stdin().is_terminal(),
        }
    }
}

impl Default for TerminalKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl KeySource for TerminalKeys {
    fn poll_key(&mut self) -> Option<KeyInput> {
        if !self.available {
            return None;
        }

        if self.guard.is_none() {
            match RawModeGuard::acquire() {
                Ok(guard) => self.guard = Some(guard),
                Err(e) => {
                    warn!("無法啟用 raw mode，停用暫停功能: {e}");
                    self.available = false;
                    return None;
                }
            }
        }

        if !event::poll(Duration::ZERO).unwrap_or(false) {
            return None;
        }

        match event::read() {
            Ok(Event::Key(KeyEvent {
                code: KeyCode::Char(c),
                modifiers,
                kind: KeyEventKind::Press,
                ..
            })) => {
                if modifiers.contains(KeyModifiers::CONTROL) && c.eq_ignore_ascii_case(&'c') {
                    Some(KeyInput::Interrupt)
                } else {
                    Some(KeyInput::Char(c.to_ascii_lowercase()))
                }
            }
            _ => None,
        }
    }

    fn release(&mut self) {
        self.guard = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    TogglePause,
    Interrupt,
}

/// 掃描迴圈的暫停狀態
pub struct PauseControl {
    keys: Box<dyn KeySource>,
    paused: bool,
}

impl PauseControl {
    #[must_use]
    pub fn new(keys: Box<dyn KeySource>) -> Self {
        Self {
            keys,
            paused: false,
        }
    }

    /// 每個迴圈呼叫一次，回傳本次收到的控制訊號
    pub fn step(&mut self) -> Option<ControlSignal> {
        match self.keys.poll_key()? {
            KeyInput::Char(c) if c == PAUSE_KEY => {
                self.paused = !self.paused;
                Some(ControlSignal::TogglePause)
            }
            KeyInput::Interrupt => Some(ControlSignal::Interrupt),
            KeyInput::Char(_) => None,
        }
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// 離開掃描迴圈時呼叫：解除暫停並還原終端機
    pub fn release(&mut self) {
        self.paused = false;
        self.keys.release();
    }
}
