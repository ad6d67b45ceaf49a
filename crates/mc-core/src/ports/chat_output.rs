use crate::ids::PeerId;

/// Where received chat lines and mesh notices are shown to the user.
pub trait ChatOutputPort: Send + Sync {
    fn show_chat(&self, from: &PeerId, text: &str);

    fn show_notice(&self, notice: &str);
}
