//! Todo extraction for daily-note rollover workflows.
//! The core is pure: callers hand in the lines of a Markdown note plus an
//! options record, and get back the ordered subsequence of lines worth
//! carrying over to a new note. Reading notes, picking which two notes to
//! compare, and splicing the result into a target document are all caller
//! concerns and live outside this crate.

pub mod core {
    //! Data model: line classification variants, the extraction options
    //! record, and raw-text line splitting.

    use serde::{Deserialize, Serialize};

    /// Bullet characters accepted at the start of a list item.
    pub const DEFAULT_BULLET_SYMBOLS: &str = "-*+";

    /// Status tokens that mark a checkbox as done or cancelled.
    pub const DEFAULT_DONE_STATUS_MARKERS: &str = "xX-";

    /* ---------------------------- Classification ---------------------------- */

    /// What a single line of a note is, as far as extraction cares.
    ///
    /// Exactly one variant applies per line. A malformed checkbox (empty or
    /// multi-grapheme status token, unclosed bracket) is never a todo; it
    /// falls through to `Bullet` or `Content`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "snake_case")]
    pub enum LineKind {
        /// A checkbox whose status token is not in the done set.
        OpenTodo,
        /// A checkbox whose status token is in the done set.
        DoneTodo,
        /// A plain list item without a valid checkbox.
        Bullet,
        /// One-or-more `#` followed by a space.
        Heading { level: usize },
        /// Anything else: prose, blank lines, numbered lists, code.
        Content,
    }

    impl LineKind {
        /// True for both open and done checkboxes.
        pub fn is_todo(self) -> bool {
            matches!(self, LineKind::OpenTodo | LineKind::DoneTodo)
        }
    }

    /* ------------------------------- Options ------------------------------- */

    /// Policy toggles for a single extraction pass.
    ///
    /// All fields have serde defaults, so a persisted options record only
    /// needs to name the toggles it changes.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ExtractionOptions {
        /// Carry each qualifying line's indented descendant block along.
        pub with_children: bool,

        /// Characters accepted as list bullets. Matched literally.
        pub bullet_symbols: String,

        /// Grapheme clusters whose presence as a status token means "done".
        pub done_status_markers: String,

        /// Headings (other than the first line of the note) qualify as roots.
        pub with_subheadings: bool,

        /// Plain non-checkbox bullets qualify as roots.
        pub with_bullets: bool,

        /// Keep only children that are themselves todos, bullets, or (when
        /// `with_subheadings`) headings.
        pub filter_children: bool,

        /// When false, a completed child and its whole subtree are excised
        /// from a collected block.
        pub with_completed_children: bool,

        /// Preserve top-level lines that are not todos of either status
        /// (headings, prose) so document structure survives splicing.
        pub preserve_non_bullet_points: bool,

        /// Only todos under this heading qualify. `None` extracts from the
        /// whole note.
        pub daily_note_heading: Option<String>,
    }

    impl Default for ExtractionOptions {
        fn default() -> Self {
            Self {
                with_children: false,
                bullet_symbols: DEFAULT_BULLET_SYMBOLS.to_string(),
                done_status_markers: DEFAULT_DONE_STATUS_MARKERS.to_string(),
                with_subheadings: false,
                with_bullets: false,
                filter_children: false,
                with_completed_children: true,
                preserve_non_bullet_points: false,
                daily_note_heading: None,
            }
        }
    }

    impl ExtractionOptions {
        /// Flag option sets that silently classify nothing as a todo.
        /// Extraction itself tolerates them; interactive callers usually
        /// want to reject them up front.
        pub fn validate(&self) -> Result<(), OptionsError> {
            if self.bullet_symbols.is_empty() {
                return Err(OptionsError::EmptyBulletSymbols);
            }
            if self.done_status_markers.is_empty() {
                return Err(OptionsError::EmptyDoneStatusMarkers);
            }
            Ok(())
        }
    }

    /* --------------------------- Errors (domain) --------------------------- */

    #[derive(Debug, thiserror::Error)]
    pub enum OptionsError {
        #[error("bullet symbol set is empty; no line can match a list item")]
        EmptyBulletSymbols,
        #[error("done status marker set is empty; no todo can ever complete")]
        EmptyDoneStatusMarkers,
    }

    /* ----------------------------- Raw splitting ---------------------------- */

    /// Split raw note text into lines on `\r\n`, `\r`, or `\n`.
    ///
    /// Mirrors the usual editor behavior: a trailing separator produces a
    /// trailing empty line, and a lone `\r` counts as a separator.
    pub fn split_note_lines(text: &str) -> Vec<String> {
        let mut lines = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\n' => lines.push(std::mem::take(&mut current)),
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    lines.push(std::mem::take(&mut current));
                }
                other => current.push(other),
            }
        }
        lines.push(current);
        lines
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn split_handles_all_separator_styles() {
            assert_eq!(split_note_lines("a\nb"), vec!["a", "b"]);
            assert_eq!(split_note_lines("a\r\nb"), vec!["a", "b"]);
            assert_eq!(split_note_lines("a\rb"), vec!["a", "b"]);
            assert_eq!(split_note_lines("a\r\n\nb\r"), vec!["a", "", "b", ""]);
            assert_eq!(split_note_lines(""), vec![""]);
        }

        #[test]
        fn options_deserialize_with_defaults() {
            let opts: ExtractionOptions =
                serde_json::from_str(r#"{"with_children": true}"#).expect("options parse");
            assert!(opts.with_children);
            assert_eq!(opts.bullet_symbols, DEFAULT_BULLET_SYMBOLS);
            assert_eq!(opts.done_status_markers, DEFAULT_DONE_STATUS_MARKERS);
            assert!(opts.with_completed_children);
            assert_eq!(opts.daily_note_heading, None);
        }

        #[test]
        fn validate_rejects_empty_symbol_sets() {
            let mut opts = ExtractionOptions::default();
            assert!(opts.validate().is_ok());

            opts.bullet_symbols.clear();
            assert!(matches!(
                opts.validate(),
                Err(OptionsError::EmptyBulletSymbols)
            ));

            opts.bullet_symbols = DEFAULT_BULLET_SYMBOLS.to_string();
            opts.done_status_markers.clear();
            assert!(matches!(
                opts.validate(),
                Err(OptionsError::EmptyDoneStatusMarkers)
            ));
        }
    }
}

pub mod classify {
    //! One structured line classifier built on `nom`.
    //!
    //! The checkbox shape is: optional leading whitespace, one configured
    //! bullet symbol, a single space, `[`, a status token running to the
    //! first `]`, then anything. The token must be exactly one grapheme
    //! cluster to count as a status at all; `[]`, `[  ]`, and multi-symbol
    //! tokens make the line an ordinary bullet instead of a todo.
    //!
    //! Matching bullet symbols with `one_of` keeps them literal, so symbol
    //! sets containing regex metacharacters need no escaping anywhere.

    use crate::core::{ExtractionOptions, LineKind};
    use nom::{
        IResult,
        bytes::complete::take_until,
        character::complete::{char, one_of, space0},
        error::VerboseError,
        sequence::{delimited, preceded, tuple},
    };
    use unicode_segmentation::UnicodeSegmentation;

    type PResult<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

    /// Classify a single line under the given options.
    pub fn classify(line: &str, opts: &ExtractionOptions) -> LineKind {
        if let Some(token) = checkbox_token(line, &opts.bullet_symbols) {
            let mut clusters = token.graphemes(true);
            if let (Some(tok), None) = (clusters.next(), clusters.next()) {
                return if opts.done_status_markers.graphemes(true).any(|m| m == tok) {
                    LineKind::DoneTodo
                } else {
                    LineKind::OpenTodo
                };
            }
            // Zero or several clusters: malformed checkbox, fall through.
        }
        if let Some(level) = heading_level(line) {
            return LineKind::Heading { level };
        }
        if is_bullet(line, &opts.bullet_symbols) {
            return LineKind::Bullet;
        }
        LineKind::Content
    }

    /// Bracket interior of a checkbox-shaped line, if the shape matches.
    /// The token may still be invalid (wrong cluster count); the caller
    /// decides that.
    fn checkbox_token<'a>(line: &'a str, bullets: &str) -> Option<&'a str> {
        let parsed: PResult<'a, &'a str> = preceded(
            tuple((space0, one_of(bullets), char(' '))),
            delimited(char('['), take_until("]"), char(']')),
        )(line);
        match parsed {
            Ok((_rest, token)) => Some(token),
            Err(_) => None,
        }
    }

    fn is_bullet(line: &str, bullets: &str) -> bool {
        let parsed: PResult<'_, _> = tuple((space0, one_of(bullets), char(' ')))(line);
        parsed.is_ok()
    }

    /// Heading depth when the line is one: one-or-more `#` then a space,
    /// after optional indentation.
    pub fn heading_level(line: &str) -> Option<usize> {
        let trimmed = line.trim_start();
        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if hashes >= 1 && trimmed[hashes..].starts_with(' ') {
            Some(hashes)
        } else {
            None
        }
    }

    /// Heading text with the leading `#`s and surrounding whitespace
    /// stripped. Used for heading-scoping and exclusion matching; also
    /// accepts a bare title and returns it trimmed.
    pub fn heading_title(line: &str) -> &str {
        line.trim_start().trim_start_matches('#').trim()
    }

}

pub mod extract {
    //! Indentation-driven block walking and the top-level extraction scan.
    //!
    //! Canonical policy set (the historical implementations disagreed on
    //! these; this crate commits to one coherent behavior):
    //! - a non-qualifying line advances the scan by exactly one, so the
    //!   children of a completed or non-todo parent are re-scanned as
    //!   candidates in their own right;
    //! - the scan stride over a collected block is the source child count,
    //!   never the count retained after filtering;
    //! - excising a completed child removes its whole subtree;
    //! - a blank line is treated as indentation 0 and therefore ends any
    //!   block it appears in.

    use crate::classify::{classify, heading_title};
    use crate::core::{ExtractionOptions, LineKind};

    /// Leading-whitespace count of a line. Blank and whitespace-only lines
    /// report 0 so separators never read as deeper children.
    pub fn indentation(line: &str) -> usize {
        if line.trim().is_empty() {
            return 0;
        }
        line.chars().take_while(|c| c.is_whitespace()).count()
    }

    /// Extract the todo blocks of a note. Pure and total: any input line
    /// array yields an ordered subsequence of itself.
    pub fn extract_todos<S: AsRef<str>>(lines: &[S], opts: &ExtractionOptions) -> Vec<String> {
        TodoExtractor::new(lines, opts).run()
    }

    /// Single left-to-right pass over a borrowed line array.
    pub struct TodoExtractor<'a, S> {
        lines: &'a [S],
        opts: &'a ExtractionOptions,
    }

    impl<'a, S: AsRef<str>> TodoExtractor<'a, S> {
        pub fn new(lines: &'a [S], opts: &'a ExtractionOptions) -> Self {
            Self { lines, opts }
        }

        fn line(&self, i: usize) -> &str {
            self.lines[i].as_ref()
        }

        /// True iff a next line exists and is indented deeper than `i`.
        pub fn has_children(&self, i: usize) -> bool {
            i + 1 < self.lines.len()
                && indentation(self.line(i + 1)) > indentation(self.line(i))
        }

        /// Source size of `parent`'s block: the run of following lines
        /// indented strictly deeper than `parent` itself. Children at any
        /// depth count; only the parent's own indentation matters.
        pub fn count_children(&self, parent: usize) -> usize {
            let parent_ind = indentation(self.line(parent));
            let mut n = 0;
            for j in parent + 1..self.lines.len() {
                if indentation(self.line(j)) > parent_ind {
                    n += 1;
                } else {
                    break;
                }
            }
            n
        }

        /// The lines of `parent`'s block after child filtering. The scan
        /// stride must still come from `count_children`; skipped lines are
        /// stepped over, not re-scanned.
        pub fn collect_children(&self, parent: usize) -> Vec<String> {
            let parent_ind = indentation(self.line(parent));
            let mut out = Vec::new();
            let mut j = parent + 1;
            while j < self.lines.len() && indentation(self.line(j)) > parent_ind {
                let kind = classify(self.line(j), self.opts);
                if !self.opts.with_completed_children && kind == LineKind::DoneTodo {
                    // The completed child's own descendants go with it.
                    j += self.count_children(j) + 1;
                    continue;
                }
                if self.opts.filter_children && !self.child_is_relevant(kind) {
                    j += 1;
                    continue;
                }
                out.push(self.line(j).to_string());
                j += 1;
            }
            out
        }

        fn child_is_relevant(&self, kind: LineKind) -> bool {
            match kind {
                LineKind::OpenTodo | LineKind::Bullet => true,
                LineKind::Heading { .. } => self.opts.with_subheadings,
                LineKind::DoneTodo | LineKind::Content => false,
            }
        }

        /// Nearest preceding heading comparison for heading-scoped
        /// extraction. Linear backward scan; notes are hundreds of lines,
        /// not millions.
        fn under_scoped_heading(&self, i: usize, target: &str) -> bool {
            let want = heading_title(target);
            for j in (0..i).rev() {
                if let LineKind::Heading { .. } = classify(self.line(j), self.opts) {
                    return heading_title(self.line(j)) == want;
                }
            }
            false
        }

        fn qualifies(&self, i: usize, kind: LineKind) -> bool {
            match kind {
                LineKind::OpenTodo => match &self.opts.daily_note_heading {
                    Some(target) => self.under_scoped_heading(i, target),
                    None => true,
                },
                LineKind::Heading { .. } => self.opts.with_subheadings && i != 0,
                LineKind::Bullet => self.opts.with_bullets,
                LineKind::DoneTodo | LineKind::Content => false,
            }
        }

        /// The extraction driver.
        pub fn run(&self) -> Vec<String> {
            let mut out = Vec::new();
            let mut i = 0;
            while i < self.lines.len() {
                let kind = classify(self.line(i), self.opts);
                if self.qualifies(i, kind) {
                    out.push(self.line(i).to_string());
                    if self.opts.with_children && self.has_children(i) {
                        out.extend(self.collect_children(i));
                        i += self.count_children(i);
                    }
                } else if self.opts.preserve_non_bullet_points
                    && indentation(self.line(i)) == 0
                    && !kind.is_todo()
                {
                    out.push(self.line(i).to_string());
                }
                i += 1;
            }
            out
        }
    }

    /* ----------------------------- Empty todos ----------------------------- */

    /// A checkbox with no text after it. Such lines round-trip forever if
    /// carried over, so callers usually drop them.
    pub fn is_empty_todo(line: &str) -> bool {
        let trimmed = line.trim();
        trimmed == "- [ ]" || trimmed == "- [  ]"
    }

    pub fn remove_empty_todos<S: AsRef<str>>(lines: &[S]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.as_ref())
            .filter(|l| !is_empty_todo(l))
            .map(str::to_string)
            .collect()
    }

}

pub mod exclusions {
    //! Pre-filter removing everything under excluded headings before the
    //! extraction scan ever sees it.
    //!
    //! Exclusion is a state machine over heading levels: a heading whose
    //! normalized title matches an excluded entry starts an excluded region
    //! that covers strictly deeper headings and all non-heading lines, and
    //! ends at the next heading at the same or a shallower level that does
    //! not itself match. Content before the first heading is always kept.

    use crate::classify::{heading_level, heading_title};

    /// Remove excluded sections from a note. Entries are trimmed and
    /// compared case-insensitively; blank entries are ignored, and an
    /// effectively empty set returns the input unchanged.
    pub fn filter_excluded_headings<S: AsRef<str>>(
        lines: &[S],
        excluded: &[String],
    ) -> Vec<String> {
        let normalized: Vec<String> = excluded
            .iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        if normalized.is_empty() {
            return lines.iter().map(|l| l.as_ref().to_string()).collect();
        }

        let mut out = Vec::new();
        let mut excluded_level: Option<usize> = None;
        for line in lines {
            let line = line.as_ref();
            let Some(level) = heading_level(line) else {
                if excluded_level.is_none() {
                    out.push(line.to_string());
                }
                continue;
            };

            let title = heading_title(line).to_lowercase();
            if normalized.iter().any(|e| heading_matches(&title, e)) {
                // Keep the shallowest active border so a matching child
                // heading cannot narrow an enclosing exclusion.
                excluded_level = Some(excluded_level.map_or(level, |b| b.min(level)));
                continue;
            }
            match excluded_level {
                Some(border) if level > border => continue,
                _ => {
                    excluded_level = None;
                    out.push(line.to_string());
                }
            }
        }
        out
    }

    /// A heading matches an entry on exact normalized equality, or when the
    /// entry is a leading prefix ending at a word break: "section 1" matches
    /// "section 1 (archived)" but not "section 10".
    fn heading_matches(title: &str, entry: &str) -> bool {
        title == entry
            || title
                .strip_prefix(entry)
                .map(|rest| rest.starts_with(' '))
                .unwrap_or(false)
    }

}

pub mod sections {
    //! Heading-delimited slicing helpers for callers that roll todos over
    //! into specific sections of a target note.

    use crate::core::ExtractionOptions;
    use crate::extract::extract_todos;
    use indexmap::IndexMap;

    /// The lines strictly between two exact heading lines, with blank edges
    /// trimmed. If `from` is missing, or `until` is given but missing, the
    /// whole input comes back so the caller can fall back to end-of-note
    /// behavior.
    pub fn content_between_headings<S: AsRef<str>>(
        lines: &[S],
        from: &str,
        until: Option<&str>,
    ) -> Vec<String> {
        let all = |lines: &[S]| {
            lines
                .iter()
                .map(|l| l.as_ref().to_string())
                .collect::<Vec<_>>()
        };

        let Some(begin) = lines.iter().position(|l| l.as_ref() == from) else {
            return all(lines);
        };

        let slice = match until {
            Some(h2) => {
                let Some(end) = lines.iter().position(|l| l.as_ref() == h2) else {
                    return all(lines);
                };
                if end <= begin {
                    &lines[0..0]
                } else {
                    &lines[begin + 1..end]
                }
            }
            None => &lines[begin + 1..],
        };
        trim_blank_edges(slice)
    }

    /// Extract todos per chosen heading, preserving the caller's heading
    /// order in the result. Each found heading's section runs to the next
    /// chosen heading that appears later in the note (or to end of note);
    /// headings absent from the note produce no entry.
    pub fn group_todos_by_heading<S: AsRef<str>>(
        lines: &[S],
        headings: &[String],
        opts: &ExtractionOptions,
    ) -> IndexMap<String, Vec<String>> {
        let mut marks: Vec<(usize, &String)> = Vec::new();
        for heading in headings {
            if let Some(pos) = lines.iter().position(|l| l.as_ref() == heading.as_str()) {
                marks.push((pos, heading));
            }
        }
        let boundaries: Vec<usize> = marks.iter().map(|(pos, _)| *pos).collect();

        let mut out = IndexMap::new();
        for (pos, heading) in &marks {
            let end = boundaries
                .iter()
                .copied()
                .filter(|b| b > pos)
                .min()
                .unwrap_or(lines.len());
            let section = trim_blank_edges(&lines[pos + 1..end]);
            out.insert((*heading).clone(), extract_todos(&section, opts));
        }
        out
    }

    fn trim_blank_edges<S: AsRef<str>>(slice: &[S]) -> Vec<String> {
        let Some(start) = slice.iter().position(|l| !l.as_ref().trim().is_empty()) else {
            return Vec::new();
        };
        let end = slice
            .iter()
            .rposition(|l| !l.as_ref().trim().is_empty())
            .expect("a non-blank line exists past `start`");
        slice[start..=end]
            .iter()
            .map(|l| l.as_ref().to_string())
            .collect()
    }

}

pub use crate::core::{ExtractionOptions, LineKind, split_note_lines};
pub use classify::classify;
pub use exclusions::filter_excluded_headings;
pub use extract::{TodoExtractor, extract_todos};
