//! Attribute mask and the pre-initialized color-pair table (component D).

use ratatui::style::{Color, Modifier, Style};

/// The eight SGR color indices, in the order the original assigns them.
const PALETTE: [Color; 8] = [
    Color::Black,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::Blue,
    Color::Magenta,
    Color::Cyan,
    Color::White,
];

/// Bitset of {BOLD, UNDERLINE, REVERSE, BLINK, INVIS} plus the resolved
/// color pair. Mirrors curses' `attron`/`attrset` (OR vs replace) contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attrs {
    modifier: Modifier,
    pair: u8,
}

impl Default for Attrs {
    fn default() -> Self {
        Attrs {
            modifier: Modifier::empty(),
            pair: 0,
        }
    }
}

impl Attrs {
    pub fn attron(&mut self, other: Attrs) {
        self.modifier |= other.modifier;
        if other.pair != 0 {
            self.pair = other.pair;
        }
    }

    pub fn attrset(&mut self, other: Attrs) {
        *self = other;
    }

    pub fn with_bold() -> Self {
        Attrs {
            modifier: Modifier::BOLD,
            pair: 0,
        }
    }

    pub fn with_underline() -> Self {
        Attrs {
            modifier: Modifier::UNDERLINED,
            pair: 0,
        }
    }

    pub fn with_blink() -> Self {
        Attrs {
            modifier: Modifier::SLOW_BLINK,
            pair: 0,
        }
    }

    pub fn with_reverse() -> Self {
        Attrs {
            modifier: Modifier::REVERSED,
            pair: 0,
        }
    }

    pub fn with_invis() -> Self {
        Attrs {
            modifier: Modifier::HIDDEN,
            pair: 0,
        }
    }

    pub fn with_pair(pair: u8) -> Self {
        Attrs {
            modifier: Modifier::empty(),
            pair,
        }
    }

    pub fn pair(&self) -> u8 {
        self.pair
    }

    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// Resolve against the pre-built pair table into a renderable style.
    pub fn style(&self, pairs: &ColorPairs) -> Style {
        pairs.get(self.pair).add_modifier(self.modifier)
    }
}

/// Color-pair index for (fg, bg), each 0-7. Pair 0 is reserved for the
/// default. fg is rotated by one so it never collides with pair 0 at
/// fg=bg=0 (the rotation the original calls `get_color`).
pub fn pair_index(fg: u8, bg: u8) -> u8 {
    (((fg as u16 + 1) % 8) * 8 + bg as u16) as u8
}

/// The 64-entry table of pre-resolved styles (index 0 is the terminal
/// default; 1-63 are built from every (fg, bg) combination at startup).
#[derive(Debug, Clone)]
pub struct ColorPairs([Style; 64]);

impl ColorPairs {
    pub fn init() -> Self {
        let mut pairs = [Style::default(); 64];
        for fg in 0u8..8 {
            for bg in 0u8..8 {
                let idx = pair_index(fg, bg);
                if idx == 0 {
                    continue;
                }
                pairs[idx as usize] = Style::default()
                    .fg(PALETTE[fg as usize])
                    .bg(PALETTE[bg as usize]);
            }
        }
        ColorPairs(pairs)
    }

    pub fn get(&self, pair: u8) -> Style {
        self.0[pair as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_index_matches_rotation_formula() {
        // ESC[1;31;44m -> fg=red(1), bg=blue(4) -> ((1+1)%8)*8+4 = 20
        assert_eq!(pair_index(1, 4), 20);
    }

    #[test]
    fn pair_zero_is_reserved() {
        assert_eq!(pair_index(7, 0), 0);
    }

    #[test]
    fn attron_ors_modifier_and_replaces_pair() {
        let mut a = Attrs::with_bold();
        a.attron(Attrs::with_underline());
        assert!(a.modifier().contains(Modifier::BOLD));
        assert!(a.modifier().contains(Modifier::UNDERLINED));
    }

    #[test]
    fn attron_with_modifier_only_keeps_existing_pair() {
        let mut a = Attrs::with_pair(pair_index(2, 0));
        a.attron(Attrs::with_bold());
        assert_eq!(a.pair(), pair_index(2, 0));
        assert!(a.modifier().contains(Modifier::BOLD));
    }

    #[test]
    fn attrset_replaces_entirely() {
        let mut a = Attrs::with_bold();
        a.attrset(Attrs::with_underline());
        assert!(!a.modifier().contains(Modifier::BOLD));
        assert!(a.modifier().contains(Modifier::UNDERLINED));
    }

    #[test]
    fn color_pairs_resolve_to_distinct_styles() {
        let pairs = ColorPairs::init();
        let red_on_blue = pairs.get(pair_index(1, 4));
        assert_eq!(red_on_blue.fg, Some(Color::Red));
        assert_eq!(red_on_blue.bg, Some(Color::Blue));
    }
}
