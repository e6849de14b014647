/// Symbolic palette of terminal control sequences.
///
/// Rendering code only ever concatenates these fields with literal text, so a
/// frame rendered with [`Markup::plain`] is exactly the stripped form of the same
/// frame rendered with [`Markup::decorated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markup {
    pub white_on_black: &'static str,
    pub total_reset: &'static str,
    pub clear: &'static str,
    pub new_line: &'static str,

    pub yellow: &'static str,
    pub red: &'static str,
    pub red_dark: &'static str,
    pub reset: &'static str,
    pub cyan: &'static str,
    pub green: &'static str,
    pub white: &'static str,
    pub magenta: &'static str,
    pub bg_magenta: &'static str,
    pub bg_green: &'static str,
    pub bg_brown: &'static str,
    pub bg_cyan: &'static str,
}

const DECORATED: Markup = Markup {
    white_on_black: "\x1b[37;40m",
    total_reset: "\x1b[0m",
    clear: "\x1b[2J\x1b[H",
    new_line: "\n",

    yellow: "\x1b[1;33m",
    red: "\x1b[1;31m",
    red_dark: "\x1b[31;3m",
    reset: "\x1b[1;m",
    cyan: "\x1b[1;36m",
    green: "\x1b[1;32m",
    white: "\x1b[1;37m",
    magenta: "\x1b[1;35m",
    bg_magenta: "\x1b[1;45m",
    bg_green: "\x1b[1;42m",
    bg_brown: "\x1b[1;43m",
    bg_cyan: "\x1b[1;46m",
};

const PLAIN: Markup = Markup {
    white_on_black: "",
    total_reset: "",
    clear: "",
    new_line: "\n",

    yellow: "",
    red: "",
    red_dark: "",
    reset: "",
    cyan: "",
    green: "",
    white: "",
    magenta: "",
    bg_magenta: "",
    bg_green: "",
    bg_brown: "",
    bg_cyan: "",
};

/// Names accepted by [`Markup::without`]; `new_line` is layout, not color.
const COLOR_NAMES: [&str; 15] = [
    "white_on_black",
    "total_reset",
    "clear",
    "yellow",
    "red",
    "red_dark",
    "reset",
    "cyan",
    "green",
    "white",
    "magenta",
    "bg_magenta",
    "bg_green",
    "bg_brown",
    "bg_cyan",
];

impl Markup {
    pub const fn decorated() -> Self {
        DECORATED
    }

    pub const fn plain() -> Self {
        PLAIN
    }

    /// Picks the decorated palette only for a terminal with colors allowed.
    pub fn for_terminal(is_tty: bool, disable_all_colors: bool) -> Self {
        if is_tty && !disable_all_colors {
            Self::decorated()
        } else {
            Self::plain()
        }
    }

    pub fn is_color_name(name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        COLOR_NAMES.contains(&name.as_str())
    }

    /// Returns a copy with the named entries blanked. Unknown names are
    /// ignored; configuration rejects them before this is reached.
    pub fn without<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            if let Some(slot) = self.slot_mut(name.as_ref()) {
                *slot = "";
            }
        }
        self
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut &'static str> {
        let slot = match name.to_ascii_lowercase().as_str() {
            "white_on_black" => &mut self.white_on_black,
            "total_reset" => &mut self.total_reset,
            "clear" => &mut self.clear,
            "yellow" => &mut self.yellow,
            "red" => &mut self.red,
            "red_dark" => &mut self.red_dark,
            "reset" => &mut self.reset,
            "cyan" => &mut self.cyan,
            "green" => &mut self.green,
            "white" => &mut self.white,
            "magenta" => &mut self.magenta,
            "bg_magenta" => &mut self.bg_magenta,
            "bg_green" => &mut self.bg_green,
            "bg_brown" => &mut self.bg_brown,
            "bg_cyan" => &mut self.bg_cyan,
            _ => return None,
        };
        Some(slot)
    }

    /// Removes every decorated control sequence from `text`.
    pub fn strip(text: &str) -> String {
        let mut sequences = [
            DECORATED.white_on_black,
            DECORATED.total_reset,
            DECORATED.clear,
            DECORATED.yellow,
            DECORATED.red,
            DECORATED.red_dark,
            DECORATED.reset,
            DECORATED.cyan,
            DECORATED.green,
            DECORATED.white,
            DECORATED.magenta,
            DECORATED.bg_magenta,
            DECORATED.bg_green,
            DECORATED.bg_brown,
            DECORATED.bg_cyan,
        ];
        // longest first, so no sequence is cut by a shorter one
        sequences.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut out = text.to_string();
        for seq in sequences {
            if out.contains(seq) {
                out = out.replace(seq, "");
            }
        }
        out
    }

    /// Number of printable characters once decoration is removed.
    pub fn visible_width(text: &str) -> usize {
        if text.contains('\x1b') {
            Self::strip(text).chars().count()
        } else {
            text.chars().count()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_every_sequence() {
        let m = Markup::decorated();
        let text = format!(
            "{}a{}b{}c{}d{}{}",
            m.bg_brown, m.reset, m.red_dark, m.white_on_black, m.total_reset, m.clear
        );
        assert_eq!(Markup::strip(&text), "abcd");
    }

    #[test]
    fn plain_has_only_newlines() {
        let m = Markup::plain();
        assert_eq!(m.new_line, "\n");
        assert_eq!(m.clear, "");
        assert_eq!(m.bg_cyan, "");
    }

    #[test]
    fn without_blanks_named_fields() {
        let m = Markup::decorated().without(&["RED", "bg_brown"]);
        assert_eq!(m.red, "");
        assert_eq!(m.bg_brown, "");
        assert_eq!(m.yellow, Markup::decorated().yellow);
        assert_eq!(m.new_line, "\n");
    }

    #[test]
    fn color_names_are_case_insensitive() {
        assert!(Markup::is_color_name("BG_GREEN"));
        assert!(Markup::is_color_name("yellow"));
        assert!(!Markup::is_color_name("new_line"));
        assert!(!Markup::is_color_name("purple"));
    }

    #[test]
    fn terminal_selection() {
        assert_eq!(Markup::for_terminal(true, false), Markup::decorated());
        assert_eq!(Markup::for_terminal(true, true), Markup::plain());
        assert_eq!(Markup::for_terminal(false, false), Markup::plain());
    }

    #[test]
    fn visible_width_ignores_decoration() {
        let m = Markup::decorated();
        assert_eq!(Markup::visible_width(&format!("{}abc{}", m.green, m.reset)), 3);
        assert_eq!(Markup::visible_width("~~~"), 3);
    }
}
