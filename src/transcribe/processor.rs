use super::{Paragraph, Segment};

/// Merges provider segments into paragraphs by accumulated speech duration
///
/// Segments are appended to a bucket and their durations summed. Once the sum
/// reaches the threshold the bucket closes into a paragraph; whatever is left
/// after the last segment becomes a final, possibly short, paragraph.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphSegmenter {
    threshold: f64,
}

/// Open bucket of segments not yet emitted
#[derive(Default)]
struct Bucket<'a> {
    segments: Vec<&'a Segment>,
    duration: f64,
}

impl<'a> Bucket<'a> {
    fn push(&mut self, segment: &'a Segment) {
        self.segments.push(segment);
        self.duration += segment.end - segment.start;
    }

    fn is_full(&self, threshold: f64) -> bool {
        self.duration >= threshold
    }

    /// Close into a paragraph and reset; `None` when empty
    fn close(&mut self) -> Option<Paragraph> {
        let segments = std::mem::take(&mut self.segments);
        self.duration = 0.0;

        let first = segments.first()?;
        let last = segments.last()?;

        let joined = segments
            .iter()
            .map(|segment| segment.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Some(Paragraph {
            start: first.start,
            end: last.end,
            text: normalize_whitespace(&joined),
        })
    }
}

impl ParagraphSegmenter {
    pub const DEFAULT_THRESHOLD: f64 = 10.0;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Group time-ordered segments into paragraphs
    pub fn segment(&self, segments: &[Segment]) -> Vec<Paragraph> {
        let mut paragraphs = Vec::new();
        let mut bucket = Bucket::default();

        for segment in segments {
            bucket.push(segment);
            if bucket.is_full(self.threshold) {
                paragraphs.extend(bucket.close());
            }
        }

        paragraphs.extend(bucket.close());
        paragraphs
    }
}

impl Default for ParagraphSegmenter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

/// Collapse whitespace runs into single spaces and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_empty_input_yields_no_paragraphs() {
        assert!(ParagraphSegmenter::default().segment(&[]).is_empty());
    }

    #[test]
    fn test_short_remainder_becomes_one_paragraph() {
        let paragraphs = ParagraphSegmenter::default().segment(&[seg(0.0, 4.2, "a"), seg(4.2, 8.9, "b")]);
        assert_eq!(
            paragraphs,
            vec![Paragraph {
                start: 0.0,
                end: 8.9,
                text: "a b".to_string(),
            }]
        );
    }

    #[test]
    fn test_long_single_segment_closes_immediately() {
        let paragraphs = ParagraphSegmenter::default().segment(&[
            seg(0.0, 12.0, "long opening"),
            seg(12.0, 13.0, "tail"),
        ]);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text, "long opening");
        assert_eq!((paragraphs[0].start, paragraphs[0].end), (0.0, 12.0));
        assert_eq!(paragraphs[1].text, "tail");
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let paragraphs = ParagraphSegmenter::default().segment(&[
            seg(0.0, 5.0, "one"),
            seg(5.0, 10.0, "two"),
            seg(10.0, 11.0, "three"),
        ]);
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].text, "one two");
        assert_eq!(paragraphs[0].end, 10.0);
        assert_eq!(paragraphs[1].text, "three");
    }

    #[test]
    fn test_duration_counts_speech_not_gaps() {
        // 3s of speech spread over 40s of wall time stays in one paragraph
        let paragraphs = ParagraphSegmenter::default().segment(&[
            seg(0.0, 1.0, "a"),
            seg(20.0, 21.0, "b"),
            seg(39.0, 40.0, "c"),
        ]);
        assert_eq!(paragraphs.len(), 1);
        assert_eq!((paragraphs[0].start, paragraphs[0].end), (0.0, 40.0));
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let paragraphs = ParagraphSegmenter::default().segment(&[
            seg(0.0, 1.0, "  hello \n"),
            seg(1.0, 2.0, ""),
            seg(2.0, 3.0, "\tworld  again "),
        ]);
        assert_eq!(paragraphs[0].text, "hello world again");
    }

    #[test]
    fn test_paragraphs_partition_input_in_order() {
        let segments: Vec<Segment> = (0..37)
            .map(|i| {
                let start = i as f64 * 1.7;
                seg(start, start + 1.3 + (i % 4) as f64, &format!("w{}", i))
            })
            .collect();

        let segmenter = ParagraphSegmenter::default();
        let paragraphs = segmenter.segment(&segments);

        let rejoined = paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let expected = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, expected);

        for pair in paragraphs.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }

        // every paragraph but the last reached the threshold
        let mut cursor = 0;
        for (i, paragraph) in paragraphs.iter().enumerate() {
            let words = paragraph.text.split(' ').count();
            let duration: f64 = segments[cursor..cursor + words]
                .iter()
                .map(|s| s.end - s.start)
                .sum();
            if i + 1 < paragraphs.len() {
                assert!(duration >= segmenter.threshold());
            }
            cursor += words;
        }
        assert_eq!(cursor, segments.len());
    }

    #[test]
    fn test_output_is_deterministic() {
        let segments = vec![seg(0.0, 6.0, "x"), seg(6.0, 12.0, "y"), seg(12.0, 13.0, "z")];
        let segmenter = ParagraphSegmenter::new(7.5);
        assert_eq!(segmenter.segment(&segments), segmenter.segment(&segments));
    }
}
