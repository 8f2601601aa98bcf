use vibe_assist::{ChatController, Completion, Entry, InputSource, Transcript};

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// The chat input box: text plus a cursor counted in characters.
#[derive(Debug, Default, Clone)]
pub struct InputLine {
    pub text: String,
    pub cursor: usize,
}

impl InputLine {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_count();
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

impl InputSource for InputLine {
    fn text(&self) -> String {
        self.text.clone()
    }

    fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub chat_open: bool,

    // Chat state
    pub input: InputLine,
    pub transcript: Transcript,
    pub controller: ChatController,
    pub endpoint: String,

    // Scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of transcript area for scroll calculations
    pub chat_width: u16,  // Width of transcript area for wrap calculations
    rendered_lines: Option<u16>, // Wrapped height from the last render
    follow_bottom: bool,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(controller: ChatController, endpoint: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            chat_open: true,

            input: InputLine::default(),
            transcript: Transcript::new(),
            controller,
            endpoint: endpoint.into(),

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            rendered_lines: None,
            follow_bottom: true,

            animation_frame: 0,
        }
    }

    /// Send whatever is in the input box.
    pub fn submit(&mut self) {
        if self.controller.submit(&mut self.input, &mut self.transcript) {
            self.scroll_to_bottom();
        }
    }

    /// A request finished; render its reply.
    pub fn apply_completion(&mut self, completion: Completion) {
        self.controller.apply(completion, &mut self.transcript);
        self.scroll_to_bottom();
    }

    pub fn is_waiting(&self) -> bool {
        self.transcript.pending_count() > 0
    }

    pub fn open_chat(&mut self) {
        self.chat_open = true;
        self.scroll_to_bottom();
    }

    pub fn close_chat(&mut self) {
        self.chat_open = false;
    }

    pub fn toggle_chat(&mut self) {
        if self.chat_open {
            self.close_chat();
        } else {
            self.open_chat();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.max_scroll();
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(max_scroll);
        self.follow_bottom = self.chat_scroll >= max_scroll;
    }

    fn max_scroll(&self) -> u16 {
        self.total_chat_lines().saturating_sub(self.visible_height())
    }

    pub fn page_up(&mut self) {
        self.scroll_up((self.visible_height() / 2).max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down((self.visible_height() / 2).max(1));
    }

    /// Scroll transcript to bottom so the newest entry is visible
    pub fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
        self.chat_scroll = self.max_scroll();
    }

    /// Record the wrapped height the renderer measured. A view pinned to
    /// the bottom stays there; any other offset is clamped.
    pub fn set_rendered_lines(&mut self, lines: usize) {
        self.rendered_lines = Some(u16::try_from(lines).unwrap_or(u16::MAX));
        let max_scroll = self.max_scroll();
        if self.follow_bottom {
            self.chat_scroll = max_scroll;
        } else {
            self.chat_scroll = self.chat_scroll.min(max_scroll);
        }
    }

    fn visible_height(&self) -> u16 {
        if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        }
    }

    /// Rendered height of the transcript. Before the first render this is
    /// an estimate that wraps by character count.
    pub fn total_chat_lines(&self) -> u16 {
        self.rendered_lines.unwrap_or_else(|| self.estimate_chat_lines())
    }

    fn estimate_chat_lines(&self) -> u16 {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: usize = 0;

        for entry in self.transcript.entries() {
            total_lines += 1; // Role line
            match entry {
                Entry::Message(message) => {
                    for line in message.text.lines() {
                        // Use character count, not byte length, for proper UTF-8 handling
                        let char_count = line.chars().count();
                        total_lines += char_count.div_ceil(wrap_width).max(1);
                    }
                }
                Entry::Pending(_) => {
                    total_lines += 1; // "Thinking..."
                }
            }
            total_lines += 1; // Blank line after entry
        }

        u16::try_from(total_lines).unwrap_or(u16::MAX)
    }
}
