//! Aggregation over a practice session's per-frame readings.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::core::emotion::{round1, Emotion, EmotionScores};

/// Number of best moments reported by default
pub const DEFAULT_BEST_MOMENTS: usize = 3;

/// One analysed frame as accumulated by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Emotion distribution of the frame
    #[serde(default)]
    pub emotions: EmotionScores,
    /// Dominant label reported for the frame
    #[serde(default = "neutral")]
    pub dominant_emotion: Emotion,
    /// Confidence score of the frame
    #[serde(default)]
    pub confidence_score: f64,
    /// Milliseconds since the practice started
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// Captured frame, usually a data URL
    #[serde(default)]
    pub frame: Option<String>,
}

fn neutral() -> Emotion {
    Emotion::Neutral
}

#[allow(clippy::cast_precision_loss)]
fn timestamp_or_index(record: &SessionRecord, index: usize) -> f64 {
    record.timestamp.unwrap_or(index as f64)
}

/// A high-confidence frame of the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMoment {
    /// Position in the history
    pub index: usize,
    /// Record timestamp, or the index when absent
    pub timestamp: f64,
    /// Confidence score
    pub score: f64,
    /// Dominant emotion
    pub emotion: Emotion,
    /// Captured frame, passed through unchanged
    pub frame: Option<String>,
}

/// The `top_n` records with the highest confidence; ties keep history order.
pub fn best_moments(history: &[SessionRecord], top_n: usize) -> Vec<BestMoment> {
    let mut moments: Vec<BestMoment> = history
        .iter()
        .enumerate()
        .map(|(index, record)| BestMoment {
            index,
            timestamp: timestamp_or_index(record, index),
            score: record.confidence_score,
            emotion: record.dominant_emotion,
            frame: record.frame.clone(),
        })
        .collect();

    moments.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    moments.truncate(top_n);
    moments
}

/// Feedback bucket selected by the session's dominant emotion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackTone {
    /// Mostly happy
    Happy,
    /// Mostly neutral
    Neutral,
    /// Mostly fearful
    Fear,
    /// Mostly surprised
    Surprise,
    /// Sad, angry or disgusted
    Gloomy,
}

impl From<Emotion> for FeedbackTone {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Happy => Self::Happy,
            Emotion::Neutral => Self::Neutral,
            Emotion::Fear => Self::Fear,
            Emotion::Surprise => Self::Surprise,
            Emotion::Sad | Emotion::Angry | Emotion::Disgust => Self::Gloomy,
        }
    }
}

/// Static feedback content for one tone.
///
/// `message` may contain `{value}`, replaced by the dominant emotion's mean
/// percentage with one decimal.
#[derive(Debug)]
pub struct FeedbackTemplate {
    /// Card title
    pub title: &'static str,
    /// Message template
    pub message: &'static str,
    /// Practice tips
    pub tips: &'static [&'static str],
    /// Letter grade
    pub grade: &'static str,
    /// Display colour
    pub color: &'static str,
}

static FEEDBACK_TEMPLATES: [(FeedbackTone, FeedbackTemplate); 5] = [
    (
        FeedbackTone::Happy,
        FeedbackTemplate {
            title: "😊 훌륭해요!",
            message: "밝고 자신감 넘치는 표정이었어요! (행복 {value}%)",
            tips: &[
                "✅ 긍정적인 에너지가 느껴져요",
                "💡 이 표정을 면접/발표에서도 유지하세요",
                "⭐ 미소는 청중과의 연결고리가 됩니다",
            ],
            grade: "A",
            color: "#4CAF50",
        },
    ),
    (
        FeedbackTone::Neutral,
        FeedbackTemplate {
            title: "😐 안정적이에요",
            message: "차분하고 안정적인 표정이었어요 (중립 {value}%)",
            tips: &[
                "✅ 침착한 모습이 좋아요",
                "💡 중요한 포인트에서는 미소를 더해보세요",
                "⭐ 표정 변화로 메시지를 강조할 수 있어요",
            ],
            grade: "B+",
            color: "#2196F3",
        },
    ),
    (
        FeedbackTone::Fear,
        FeedbackTemplate {
            title: "😰 긴장하셨나요?",
            message: "약간 긴장된 모습이 보였어요 (불안 {value}%)",
            tips: &[
                "💡 심호흡을 하고 천천히 말해보세요",
                "⭐ 연습을 반복하면 자신감이 생깁니다",
                "🎯 청중을 친구라고 생각해보세요",
                "✨ 당신은 충분히 잘하고 있어요!",
            ],
            grade: "C+",
            color: "#FF9800",
        },
    ),
    (
        FeedbackTone::Surprise,
        FeedbackTemplate {
            title: "😮 생동감 있어요!",
            message: "표정이 풍부하고 생동감 있었어요 (놀람 {value}%)",
            tips: &[
                "✅ 표정이 살아있어요",
                "💡 과하지 않게 조절하면 완벽해요",
                "⭐ 중요한 순간에 이런 표정을 활용하세요",
            ],
            grade: "B",
            color: "#9C27B0",
        },
    ),
    (
        FeedbackTone::Gloomy,
        FeedbackTemplate {
            title: "🤔 표정을 밝게!",
            message: "표정이 조금 어두워 보였어요",
            tips: &[
                "💡 거울을 보며 미소 연습을 해보세요",
                "⭐ 긍정적인 마인드로 시작해보세요",
                "✨ 연습할 때 좋아하는 음악을 들어보세요",
            ],
            grade: "C",
            color: "#F44336",
        },
    ),
];

impl FeedbackTone {
    /// Template for this tone
    pub fn template(self) -> &'static FeedbackTemplate {
        FEEDBACK_TEMPLATES
            .iter()
            .find(|(tone, _)| *tone == self)
            .map(|(_, template)| template)
            .unwrap_or(&FEEDBACK_TEMPLATES[FEEDBACK_TEMPLATES.len() - 1].1)
    }
}

/// Session averages behind a graded feedback card
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    /// Mean confidence, one decimal
    pub avg_confidence: f64,
    /// Label with the highest mean
    pub dominant_emotion: Emotion,
    /// Mean per label, one decimal
    pub avg_emotions: EmotionScores,
    /// Letter grade
    pub grade: String,
    /// Display colour
    pub color: String,
}

/// Feedback card for a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    /// Card title
    pub title: String,
    /// Message
    pub message: String,
    /// Practice tips
    pub tips: Vec<String>,
    /// Averages and grade; absent when there was nothing to analyse
    #[serde(flatten)]
    pub summary: Option<SessionSummary>,
}

impl Feedback {
    /// The card returned for an empty session
    pub fn insufficient_data() -> Self {
        Self {
            title: "데이터 없음".to_string(),
            message: "연습 데이터가 충분하지 않습니다.".to_string(),
            tips: vec!["먼저 연습을 시작해주세요!".to_string()],
            summary: None,
        }
    }

    /// Whether this is the insufficient-data card
    pub fn is_insufficient(&self) -> bool {
        self.summary.is_none()
    }
}

/// Average the session and pick the feedback template of its dominant
/// emotion.
pub fn build_feedback(history: &[SessionRecord]) -> Feedback {
    let Some(avg_emotions) = EmotionScores::mean(history.iter().map(|r| &r.emotions)) else {
        return Feedback::insufficient_data();
    };

    #[allow(clippy::cast_precision_loss)]
    let avg_confidence =
        history.iter().map(|r| r.confidence_score).sum::<f64>() / history.len() as f64;
    let dominant_emotion = avg_emotions.dominant();
    let template = FeedbackTone::from(dominant_emotion).template();

    let value = format!("{:.1}", avg_emotions.get(dominant_emotion));

    Feedback {
        title: template.title.to_string(),
        message: template.message.replace("{value}", &value),
        tips: template.tips.iter().map(|t| t.to_string()).collect(),
        summary: Some(SessionSummary {
            avg_confidence: round1(avg_confidence),
            dominant_emotion,
            avg_emotions: avg_emotions.map(round1),
            grade: template.grade.to_string(),
            color: template.color.to_string(),
        }),
    }
}

/// Chart series projected from a session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Timeline {
    /// X axis: record timestamp, or index when absent
    pub timestamps: Vec<f64>,
    /// Happy percentage per record
    pub happy: Vec<f64>,
    /// Neutral percentage per record
    pub neutral: Vec<f64>,
    /// Fear percentage per record
    pub fear: Vec<f64>,
    /// Confidence score per record
    pub confidence: Vec<f64>,
}

impl Timeline {
    /// Number of points
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Whether there are no points
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// One point per record, in history order.
pub fn build_timeline(history: &[SessionRecord]) -> Timeline {
    let mut timeline = Timeline::default();
    for (index, record) in history.iter().enumerate() {
        timeline.timestamps.push(timestamp_or_index(record, index));
        timeline.happy.push(record.emotions.happy);
        timeline.neutral.push(record.emotions.neutral);
        timeline.fear.push(record.emotions.fear);
        timeline.confidence.push(record.confidence_score);
    }
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::emotion::{score_confidence, EmotionReading};

    fn record(
        emotions: EmotionScores,
        timestamp: Option<f64>,
        frame: Option<&str>,
    ) -> SessionRecord {
        let reading = EmotionReading::from_scores(emotions);
        SessionRecord {
            emotions,
            dominant_emotion: reading.dominant_emotion,
            confidence_score: reading.confidence_score,
            timestamp,
            frame: frame.map(String::from),
        }
    }

    fn happy(pct: f64) -> EmotionScores {
        EmotionScores {
            happy: pct,
            neutral: 100.0 - pct,
            ..Default::default()
        }
    }

    fn fearful(pct: f64) -> EmotionScores {
        EmotionScores {
            fear: pct,
            neutral: 100.0 - pct,
            ..Default::default()
        }
    }

    #[test]
    fn test_best_moments_top_three() {
        let history = vec![
            record(happy(10.0), Some(0.0), Some("f0")),
            record(happy(90.0), Some(2000.0), Some("f1")),
            record(fearful(80.0), Some(4000.0), Some("f2")),
            record(happy(50.0), Some(6000.0), Some("f3")),
            record(happy(30.0), Some(8000.0), None),
        ];
        let moments = best_moments(&history, DEFAULT_BEST_MOMENTS);

        assert_eq!(moments.len(), 3);
        assert!(moments.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(moments[0].index, 1);
        assert_eq!(moments[0].timestamp, 2000.0);
        assert_eq!(moments[0].frame.as_deref(), Some("f1"));
        assert_eq!(moments[0].emotion, Emotion::Happy);
        assert_eq!(moments[1].index, 3);
        assert_eq!(moments[2].index, 4);
        assert_eq!(moments[2].frame, None);
    }

    #[test]
    fn test_best_moments_ties_and_index_timestamps() {
        let history = vec![
            record(happy(40.0), None, None),
            record(happy(40.0), None, None),
        ];
        let moments = best_moments(&history, 3);
        assert_eq!(moments.len(), 2);
        assert_eq!(moments[0].index, 0);
        assert_eq!(moments[1].index, 1);
        assert_eq!(moments[1].timestamp, 1.0);
    }

    #[test]
    fn test_feedback_insufficient_data() {
        let feedback = build_feedback(&[]);
        assert!(feedback.is_insufficient());
        assert_eq!(feedback.title, "데이터 없음");
        let json = serde_json::to_value(&feedback).unwrap();
        assert!(json.get("grade").is_none());
    }

    #[test]
    fn test_feedback_single_happy_record() {
        let feedback = build_feedback(&[record(happy(80.0), None, None)]);
        let summary = feedback.summary.as_ref().unwrap();
        assert_eq!(summary.grade, "A");
        assert_eq!(summary.color, "#4CAF50");
        assert_eq!(summary.dominant_emotion, Emotion::Happy);
        assert_eq!(feedback.tips.len(), 3);
        assert_eq!(feedback.tips[0], "✅ 긍정적인 에너지가 느껴져요");
        assert!(feedback.message.contains("(행복 80.0%)"));
        assert_eq!(summary.avg_confidence, score_confidence(&happy(80.0)));
    }

    #[test]
    fn test_feedback_averages_over_history() {
        let history = vec![
            record(fearful(90.0), None, None),
            record(fearful(60.0), None, None),
            record(happy(30.0), None, None),
        ];
        let feedback = build_feedback(&history);
        let summary = feedback.summary.unwrap();
        assert_eq!(summary.dominant_emotion, Emotion::Fear);
        assert_eq!(summary.grade, "C+");
        assert_eq!(feedback.tips.len(), 4);
        assert!(feedback.message.contains("(불안 50.0%)"));
        assert_eq!(summary.avg_emotions.fear, 50.0);
        assert_eq!(summary.avg_emotions.happy, 10.0);
    }

    #[test]
    fn test_gloomy_tones_share_a_template() {
        for emotion in [Emotion::Sad, Emotion::Angry, Emotion::Disgust] {
            let tone = FeedbackTone::from(emotion);
            assert_eq!(tone, FeedbackTone::Gloomy);
            assert_eq!(tone.template().grade, "C");
        }
        let sad = EmotionScores {
            sad: 70.0,
            neutral: 30.0,
            ..Default::default()
        };
        let feedback = build_feedback(&[record(sad, None, None)]);
        assert_eq!(feedback.message, "표정이 조금 어두워 보였어요");
        assert_eq!(feedback.summary.unwrap().color, "#F44336");
    }

    #[test]
    fn test_every_tone_has_a_template() {
        let grades: Vec<_> = [
            FeedbackTone::Happy,
            FeedbackTone::Neutral,
            FeedbackTone::Fear,
            FeedbackTone::Surprise,
            FeedbackTone::Gloomy,
        ]
        .into_iter()
        .map(|t| t.template().grade)
        .collect();
        assert_eq!(grades, ["A", "B+", "C+", "B", "C"]);
    }

    #[test]
    fn test_timeline_projection() {
        let history = vec![
            record(happy(20.0), Some(0.0), None),
            record(fearful(40.0), None, None),
            record(happy(60.0), Some(4100.0), None),
        ];
        let timeline = build_timeline(&history);
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline.timestamps, vec![0.0, 1.0, 4100.0]);
        assert_eq!(timeline.happy, vec![20.0, 0.0, 60.0]);
        assert_eq!(timeline.neutral, vec![80.0, 60.0, 40.0]);
        assert_eq!(timeline.fear, vec![0.0, 40.0, 0.0]);
        assert_eq!(timeline.confidence[1], history[1].confidence_score);
    }

    #[test]
    fn test_record_deserializes_client_payload() {
        let json = r#"{
            "timestamp": 1234,
            "emotions": {"happy": 55.5, "neutral": 44.5},
            "dominant_emotion": "happy",
            "confidence_score": 81.9,
            "frame": "data:image/jpeg;base64,AAAA"
        }"#;
        let record: SessionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.timestamp, Some(1234.0));
        assert_eq!(record.dominant_emotion, Emotion::Happy);
        assert_eq!(record.emotions.fear, 0.0);
    }
}
