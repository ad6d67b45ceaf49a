//! Interactive terminal: prompts, the chat input loop and chat output.
//! 交互式终端

use std::io::Write;

use anyhow::Context;
use mc_app::SendChatUseCase;
use mc_core::ports::ChatOutputPort;
use mc_core::PeerId;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

const INPUT_PROMPT: &str = ">> ";
const QUIT_COMMAND: &str = "quit";

/// Prints inbound chat and connection notices to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOutput;

impl ChatOutputPort for TerminalOutput {
    fn show_chat(&self, from: &PeerId, text: &str) {
        println!("\n[{}]: {}", from.short(), text);
        print_prompt();
    }

    fn show_notice(&self, notice: &str) {
        println!("\n{notice}");
        print_prompt();
    }
}

fn print_prompt() {
    print!("{INPUT_PROMPT}");
    let _ = std::io::stdout().flush();
}

/// How the input loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Quit,
    Interrupted,
    EndOfInput,
}

/// Line-oriented reader shared by the join prompts and the chat loop.
pub struct Terminal<R> {
    lines: Lines<R>,
}

impl Terminal<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin> Terminal<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// Print `text` and read one line. `None` on end of input.
    pub async fn prompt(&mut self, text: &str) -> anyhow::Result<Option<String>> {
        print!("{text}");
        std::io::stdout()
            .flush()
            .context("Failed to flush stdout")?;
        self.lines
            .next_line()
            .await
            .context("Failed to read from stdin")
    }

    /// Read messages until `quit`, Ctrl-C or end of input, broadcasting each
    /// non-empty line to the mesh.
    pub async fn chat_loop(&mut self, chat: &SendChatUseCase) -> anyhow::Result<LoopExit> {
        loop {
            print_prompt();

            let line = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    println!("\nGoodbye!");
                    return Ok(LoopExit::Interrupted);
                }
                line = self.lines.next_line() => line.context("Failed to read from stdin")?,
            };

            let Some(line) = line else {
                debug!("Input closed");
                return Ok(LoopExit::EndOfInput);
            };

            let message = line.trim();
            if message.eq_ignore_ascii_case(QUIT_COMMAND) {
                return Ok(LoopExit::Quit);
            }
            if message.is_empty() {
                continue;
            }

            if chat.execute(message).await? > 0 {
                println!("[You]: {message}");
            } else {
                println!("[Waiting for connection...]");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use mc_app::MeshBroadcast;
    use std::sync::{Arc, Mutex};

    /// Counts broadcasts; reports `delivered` recipients for each.
    struct RecordingMesh {
        delivered: usize,
        sent: Mutex<usize>,
    }

    #[async_trait]
    impl MeshBroadcast for RecordingMesh {
        async fn broadcast(&self, _payload: Bytes) -> usize {
            *self.sent.lock().unwrap() += 1;
            self.delivered
        }
    }

    fn terminal(input: &'static str) -> Terminal<BufReader<&'static [u8]>> {
        Terminal::new(BufReader::new(input.as_bytes()))
    }

    #[tokio::test]
    async fn test_chat_loop_sends_non_empty_lines_until_quit() {
        let mesh = Arc::new(RecordingMesh {
            delivered: 2,
            sent: Default::default(),
        });
        let chat = SendChatUseCase::new(mesh.clone());

        let exit = terminal("hello\n\n   \nsecond\nQUIT\nnever sent\n")
            .chat_loop(&chat)
            .await
            .unwrap();

        assert_eq!(exit, LoopExit::Quit);
        assert_eq!(*mesh.sent.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_chat_loop_ends_with_input() {
        let mesh = Arc::new(RecordingMesh {
            delivered: 0,
            sent: Default::default(),
        });
        let chat = SendChatUseCase::new(mesh.clone());

        let exit = terminal("nobody home\n").chat_loop(&chat).await.unwrap();

        assert_eq!(exit, LoopExit::EndOfInput);
        assert_eq!(*mesh.sent.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_prompt_reads_one_line() {
        let mut term = terminal("10.0.0.7\n482913\n");

        assert_eq!(term.prompt("host: ").await.unwrap().as_deref(), Some("10.0.0.7"));
        assert_eq!(term.prompt("code: ").await.unwrap().as_deref(), Some("482913"));
        assert_eq!(term.prompt("more: ").await.unwrap(), None);
    }
}
