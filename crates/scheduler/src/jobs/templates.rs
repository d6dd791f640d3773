//! Message templates for the standing jobs.
//!
//! Rendered with the notify crate's `TemplateRenderer`, which enables
//! `trim_blocks`/`lstrip_blocks`, so block tags sit on their own lines and
//! every list item is one line.

pub const DAILY_SUMMARY_SUBJECT: &str =
    "Daily summary for {{ date }}{{ ' (demo data)' if demo }}";

pub const DAILY_SUMMARY_BODY: &str = r#"Here is your summary for {{ date }}.

== Market ==
{% if market_unavailable %}
Market data unavailable.
{% else %}
Sentiment: {{ market.sentiment | upper }}
{% for s in market.snapshots %}
- {{ s.name }}: {{ s.current_price | price }} ({{ s.change_percent | pct }})
{% endfor %}
{% if market.gainers %}
Top gainers:
{% for m in market.gainers %}
  + {{ m.name }} {{ m.change_percent | pct }}
{% endfor %}
{% endif %}
{% if market.losers %}
Top losers:
{% for m in market.losers %}
  - {{ m.name }} {{ m.change_percent | pct }}
{% endfor %}
{% endif %}
{% if market.significant_moves %}
Significant moves:
{% for m in market.significant_moves %}
  ! {{ m.name }} {{ m.change_percent | pct }}
{% endfor %}
{% endif %}
{% if market.category_trends %}
By category:
{% for t in market.category_trends %}
  {{ t.label }}: {{ t.average_change_percent | pct }} ({{ t.direction }})
{% endfor %}
{% endif %}
{% if market.sectors %}
Sectors, best to worst:
{% for m in market.sectors %}
  {{ m.name }} {{ m.change_percent | pct }}
{% endfor %}
{% endif %}
{% endif %}
{% if market.failed %}
Unavailable:
{% for f in market.failed %}
  {{ f.name }} ({{ f.symbol }}): {{ f.reason }}
{% endfor %}
{% endif %}

== Tasks ==
Due today ({{ tasks.due_today | length }}):
{% for t in tasks.due_today %}
- [{{ t.priority | upper }}] {{ t.title }}{{ t.when }}
{% else %}
- nothing due today
{% endfor %}
Overdue ({{ tasks.overdue | length }}):
{% for t in tasks.overdue %}
- [{{ t.priority | upper }}] {{ t.title }}{{ t.when }}
{% else %}
- nothing overdue
{% endfor %}
Open high-priority tasks: {{ tasks.high_priority_open }}
"#;

pub const MARKET_ALERT_SUBJECT: &str =
    "Market alert: {{ name }} {{ direction }} {{ change_percent | pct }}";

pub const MARKET_ALERT_BODY: &str = r#"{{ name }} ({{ symbol }}) is {{ direction }} {{ change_percent | pct }} since the previous close.
Current: {{ current_price | price }}
Previous close: {{ previous_close | price }}
Change: {{ change | signed }}
Alert threshold: {{ threshold | round(1) }}%
{% if is_demo %}
(demo data)
{% endif %}
"#;

pub const LIVE_UPDATE_SUBJECT: &str = "Market update {{ time }}";

pub const LIVE_UPDATE_BODY: &str = r#"{% for s in snapshots %}
{{ s.name }}: {{ s.current_price | price }} ({{ s.change_percent | pct }})
{% endfor %}
"#;

pub const REMINDER_SUBJECT: &str = "Reminder: {{ title }}";

pub const REMINDER_BODY: &str = r#"{{ title }}
{% if description %}
{{ description }}
{% endif %}
Scheduled for {{ scheduled }}.
{% if next %}
Next reminder: {{ next }}.
{% endif %}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use bellwether_notify::TemplateRenderer;
    use serde_json::json;

    #[test]
    fn all_templates_parse() {
        let r = TemplateRenderer::new();
        for t in [
            DAILY_SUMMARY_SUBJECT,
            DAILY_SUMMARY_BODY,
            MARKET_ALERT_SUBJECT,
            MARKET_ALERT_BODY,
            LIVE_UPDATE_SUBJECT,
            LIVE_UPDATE_BODY,
            REMINDER_SUBJECT,
            REMINDER_BODY,
        ] {
            r.validate(t).unwrap();
        }
    }

    #[test]
    fn reminder_body_skips_missing_fields() {
        let body = TemplateRenderer::new()
            .render(
                REMINDER_BODY,
                json!({"title": "pay rent", "description": null, "scheduled": "Mon 01 Jun 09:00", "next": null}),
            )
            .unwrap();
        assert_eq!(body, "pay rent\nScheduled for Mon 01 Jun 09:00.\n");
    }

    #[test]
    fn demo_marker_only_when_demo() {
        let r = TemplateRenderer::new();
        assert_eq!(
            r.render(DAILY_SUMMARY_SUBJECT, json!({"date": "Tue 10 Mar", "demo": false}))
                .unwrap(),
            "Daily summary for Tue 10 Mar"
        );
        assert_eq!(
            r.render(DAILY_SUMMARY_SUBJECT, json!({"date": "Tue 10 Mar", "demo": true}))
                .unwrap(),
            "Daily summary for Tue 10 Mar (demo data)"
        );
    }

    #[test]
    fn unavailable_market_still_lists_tasks() {
        let body = TemplateRenderer::new()
            .render(
                DAILY_SUMMARY_BODY,
                json!({
                    "date": "Tue 10 Mar",
                    "market_unavailable": true,
                    "market": {"failed": [{"symbol": "^NSEI", "name": "NIFTY 50", "reason": "timed out after 10s"}]},
                    "tasks": {
                        "due_today": [{"title": "call bank", "priority": "high", "when": " (due 14:00)"}],
                        "overdue": [],
                        "high_priority_open": 1
                    }
                }),
            )
            .unwrap();
        assert!(body.contains("Market data unavailable."));
        assert!(body.contains("NIFTY 50 (^NSEI): timed out after 10s"));
        assert!(body.contains("- [HIGH] call bank (due 14:00)"));
        assert!(body.contains("- nothing overdue"));
        assert!(body.contains("Open high-priority tasks: 1"));
    }
}
