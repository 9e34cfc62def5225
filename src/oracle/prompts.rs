//! Prompt text for item summaries and for each digest tier.

use crate::models::TierKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Per-tier wording and output-size hints.
struct TierWording {
    system: &'static str,
    input_label: &'static str,
    lead: &'static str,
    horizon: &'static str,
    bullets: &'static str,
    verdict_len: &'static str,
    topics: u8,
}

fn wording(tier: TierKind) -> TierWording {
    match tier {
        TierKind::Daily => TierWording {
            system: "You are an expert crypto market analyst. Create a comprehensive daily digest of crypto news.",
            input_label: "Articles",
            lead: "Based on the following crypto news articles from today, create a daily digest",
            horizon: "tomorrow",
            bullets: "3-5",
            verdict_len: "2-3 sentences",
            topics: 5,
        },
        TierKind::Weekly => TierWording {
            system: "You are an expert crypto market analyst. Create a comprehensive weekly digest of crypto developments.",
            input_label: "Daily Digests",
            lead: "Based on the following daily digests from the past week, create a weekly summary",
            horizon: "the next week",
            bullets: "4-6",
            verdict_len: "3-4 sentences",
            topics: 6,
        },
        TierKind::Monthly => TierWording {
            system: "You are an expert crypto market analyst. Create a comprehensive monthly digest of crypto market developments and trends.",
            input_label: "Weekly Digests",
            lead: "Based on the following weekly digests from the past month, create a monthly summary",
            horizon: "the next month",
            bullets: "5-8",
            verdict_len: "4-5 sentences",
            topics: 8,
        },
    }
}

pub fn item_prompt(article: &str) -> Prompt {
    let schema = r#"{
  "summary": ["2-4 bullet points about the article"],
  "sentiment": "One of: Positive, Negative, Neutral",
  "verdict": "Forward-looking evaluation, 1-2 sentences"
}"#;
    Prompt {
        system: "You are an assistant that processes financial/technology news.".to_string(),
        user: format!(
            "Articles:\n{article}\n\nReturn ONLY valid JSON following this schema:\n{schema}"
        ),
    }
}

pub fn digest_prompt(tier: TierKind, body: &str) -> Prompt {
    let w = wording(tier);
    let schema = format!(
        r#"{{
  "summary": ["{bullets} bullet points"],
  "sentiment": "Overall sentiment: Positive, Negative, or Neutral",
  "verdict": "Forward-looking analysis for {horizon}, {verdict_len}",
  "trending_topics": ["Top {topics} trending topics and themes"]
}}"#,
        bullets = w.bullets,
        horizon = w.horizon,
        verdict_len = w.verdict_len,
        topics = w.topics,
    );
    Prompt {
        system: w.system.to_string(),
        user: format!(
            "{lead}:\n\n{label}:\n{body}\n\nPlease analyze the overall sentiment, identify key themes and trends, \
             and provide a forward-looking verdict for {horizon}.\n\nReturn ONLY valid JSON following this schema:\n{schema}",
            lead = w.lead,
            label = w.input_label,
            horizon = w.horizon,
        ),
    }
}
