//! HTML rendering for the single-page form
//!
//! Plain string templates; every dynamic value goes through `esc`.
//! The contribution chart is drawn by plotters into an inline SVG.

use std::fmt::Write;

use axum::http::StatusCode;
use plotters::prelude::*;
use plotters_svg::SVGBackend;

use crash_risk_core::constants::{APP_NAME, APP_VERSION, MAX_THRESHOLD, MIN_THRESHOLD, THRESHOLD_STEP};
use crash_risk_core::logic::codes::{tables, CodeTable, FieldSelector};
use crash_risk_core::logic::features::numeric_bounds;
use crash_risk_core::logic::model::ModelMetadata;
use crash_risk_core::{Explanation, FeatureContribution, PredictionReport};

use crate::form::PredictForm;

const REST_USE_HELP: &str =
    "Predictive signal, not causal. Lower use is often associated with higher severity.";

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 960px; margin: 2rem auto; padding: 0 1rem; color: #1f2937; }
h1 { margin-bottom: .25rem; }
.caption { color: #6b7280; font-size: .9rem; }
.grid { display: grid; grid-template-columns: 1fr 1fr; gap: 0 2rem; }
label { display: block; margin-top: .75rem; font-weight: 600; font-size: .9rem; }
select, input[type=number] { width: 100%; padding: .35rem; }
.help { color: #6b7280; font-size: .8rem; font-weight: 400; }
details { margin: 1rem 0; }
button { margin-top: 1.5rem; padding: .6rem 1.6rem; background: #ef4444; color: #fff; border: 0; border-radius: 4px; font-size: 1rem; }
.verdict { padding: .75rem 1rem; border-radius: 4px; color: #fff; font-weight: 700; margin: .75rem 0; }
.warning { padding: .75rem 1rem; border-radius: 4px; background: #fef3c7; color: #92400e; }
.note { padding: .75rem 1rem; border-radius: 4px; background: #e0f2fe; color: #075985; }
.error { padding: .75rem 1rem; border-radius: 4px; background: #fee2e2; color: #991b1b; }
table { border-collapse: collapse; width: 100%; font-size: .85rem; }
td, th { border-bottom: 1px solid #e5e7eb; padding: .3rem .5rem; text-align: left; }
.metric { font-size: 2rem; font-weight: 700; }
"#;

/// Escape text for HTML element and attribute context
pub fn esc(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n{}\n</body>\n</html>\n",
        esc(title),
        STYLE,
        body
    )
}

// ============================================================================
// CONTROLS
// ============================================================================

fn select_field(selector: &FieldSelector) -> String {
    let mut html = format!("<label for=\"{0}\">{1}", selector.column, esc(selector.title));
    if let Some(help) = selector.help {
        let _ = write!(html, " <span class=\"help\">{}</span>", esc(help));
    }
    let _ = write!(html, "</label>\n<select id=\"{0}\" name=\"{0}\">", selector.column);

    for (idx, option) in selector.options().iter().enumerate() {
        let selected = if idx == selector.selected_index() { " selected" } else { "" };
        let _ = write!(
            html,
            "<option value=\"{}\"{}>{}</option>",
            option.code,
            selected,
            esc(option.label)
        );
    }
    html.push_str("</select>\n");
    html
}

fn select_for(table: &CodeTable, current: i64) -> String {
    select_field(&FieldSelector::new(table, current))
}

/// Number input named `name`, bounded by `column`'s layout range
fn number_field(name: &str, column: &str, title: &str, value: i64) -> String {
    let (min, max) = numeric_bounds(column).unwrap_or((0, 999));
    format!(
        "<label for=\"{0}\">{1}</label>\n\
         <input type=\"number\" id=\"{0}\" name=\"{0}\" min=\"{2}\" max=\"{3}\" step=\"1\" value=\"{4}\">\n",
        name,
        esc(title),
        min,
        max,
        value
    )
}

/// Static model card, rendered with the current threshold
pub fn model_card(threshold: f64) -> String {
    format!(
        r#"<details>
<summary><strong>Model card (what this is / what it isn't)</strong></summary>
<p><strong>What the model does</strong></p>
<ul>
<li>Predicts the probability that a crash results in <strong>severe injury</strong> (incapacitated or fatal), based on crash report variables.</li>
<li>Output is a <strong>risk score</strong> (0-1). It is <strong>not</strong> a diagnosis or certainty.</li>
</ul>
<p><strong>How to use the threshold</strong></p>
<ul>
<li><strong>HIGH risk</strong> if <code>p &ge; threshold</code>, else <strong>LOW risk</strong>.</li>
<li>Lower threshold: higher recall (catch more severe cases) but more false alarms.</li>
<li>Higher threshold: fewer false alarms but more missed severe cases.</li>
</ul>
<p><strong>Important notes</strong></p>
<ul>
<li>This model is <strong>predictive</strong>, not causal. Features can be signals of crash intensity and context.</li>
<li>Predictions are only as reliable as the inputs (Unknown/Not reported values reduce confidence).</li>
</ul>
<p><strong>Current threshold:</strong> <code>{:.2}</code></p>
</details>
"#,
        threshold
    )
}

fn form_section(form: &PredictForm) -> String {
    let mut html = String::from("<form method=\"post\" action=\"/predict\">\n");

    let _ = write!(
        html,
        "<h2>Decision Policy</h2>\n\
         <label for=\"threshold\">Decision threshold (lower = higher recall, more false alarms)</label>\n\
         <input type=\"number\" id=\"threshold\" name=\"threshold\" min=\"{}\" max=\"{}\" step=\"{}\" value=\"{:.2}\">\n",
        MIN_THRESHOLD, MAX_THRESHOLD, THRESHOLD_STEP, form.threshold
    );
    html.push_str(&model_card(form.threshold));

    html.push_str("<h2>Inputs</h2>\n<div class=\"grid\">\n<div>\n");
    html.push_str(&number_field("AGE_IM", "AGE_IM", "Driver age (AGE_IM)", form.age_im));
    html.push_str(&select_for(&tables::SEX_IM, form.sex_im));
    html.push_str(&select_for(&tables::ALCOHOL, form.alcohol));
    html.push_str(&select_for(&tables::DRUGS, form.drugs));
    html.push_str(&number_field("HOUR_acc", "HOUR_acc", "Crash hour (HOUR_acc)", form.hour_acc));
    html.push_str(&number_field("MONTH_acc", "MONTH_acc", "Month (MONTH_acc)", form.month_acc));
    html.push_str(&number_field("NUMOCCS", "NUMOCCS", "Number of occupants (NUMOCCS)", form.numoccs));
    html.push_str("</div>\n<div>\n");
    html.push_str(&select_for(&tables::DAY_WEEK, form.day_week));
    html.push_str(&select_for(&tables::LGTCON_IM, form.lgtcon_im));
    html.push_str(&select_for(&tables::WEATHR_IM, form.weathr_im));
    html.push_str(&select_for(&tables::REGION, form.region));
    html.push_str(&select_for(&tables::REL_ROAD, form.rel_road));
    html.push_str(&select_for(&tables::RELJCT2_IM, form.reljct2_im));
    html.push_str(&select_for(&tables::SPEEDREL, form.speedrel));
    html.push_str(&select_field(
        &FieldSelector::new(&tables::REST_USE, form.rest_use).with_help(REST_USE_HELP),
    ));
    html.push_str("</div>\n</div>\n");

    html.push_str("<h2>Vehicle Type (BODY_TYP)</h2>\n");
    let group = FieldSelector::new(&tables::BODY_TYP_GROUP, form.body_typ_group);
    html.push_str(&select_field(&group));

    let exact = form.exact_body_typ.unwrap_or(group.selected_code());
    let checked = if form.use_exact_body_typ { " checked" } else { "" };
    let _ = write!(
        html,
        "<details{open}>\n<summary>Advanced: use exact BODY_TYP code instead of group</summary>\n\
         <p class=\"caption\">If you know the exact BODY_TYP code from your dataset, enter it here.</p>\n\
         {field}\
         <label><input type=\"checkbox\" name=\"use_exact_body_typ\"{checked}> Use exact BODY_TYP code</label>\n\
         </details>\n",
        open = if form.use_exact_body_typ { " open" } else { "" },
        field = number_field("exact_body_typ", "BODY_TYP", "Exact BODY_TYP code", exact),
        checked = checked,
    );

    html.push_str("<button type=\"submit\">Predict</button>\n</form>\n");
    html
}

// ============================================================================
// RESULT
// ============================================================================

const CHART_WIDTH: u32 = 860;
const CHART_ROW: u32 = 26;
const RISK_UP: RGBColor = RGBColor(0xef, 0x44, 0x44);
const RISK_DOWN: RGBColor = RGBColor(0x3b, 0x82, 0xf6);

fn explanation_chart(explanation: &Explanation) -> String {
    let contributions = match explanation {
        Explanation::Available { contributions, .. } if !contributions.is_empty() => contributions,
        Explanation::Available { .. } => {
            return "<p class=\"note\">No feature contributions to show.</p>\n".to_string();
        }
        Explanation::Unavailable { reason } => {
            return format!(
                "<p class=\"note\">Couldn't compute a local explanation for this input. Details: {}</p>\n",
                esc(reason)
            );
        }
    };

    match contribution_svg(contributions) {
        Ok(svg) => svg,
        Err(e) => {
            tracing::warn!("Contribution chart failed: {}", e);
            "<p class=\"note\">Couldn't draw the contribution chart.</p>\n".to_string()
        }
    }
}

/// Horizontal bars, largest |contribution| on top; right of zero raises risk
fn contribution_svg(contributions: &[FeatureContribution]) -> Result<String, Box<dyn std::error::Error>> {
    let rows = contributions.len() as i32;
    let span = contributions
        .iter()
        .map(|c| c.contribution.abs())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max)
        .max(f64::EPSILON)
        * 1.1;
    let labels: Vec<&str> = contributions
        .iter()
        .map(|c| c.description.as_deref().unwrap_or(&c.feature))
        .collect();
    // ranks count down from the top of the chart
    let label_at = |row: i32| -> String {
        usize::try_from(rows - 1 - row)
            .ok()
            .and_then(|rank| labels.get(rank))
            .map(|label| label.to_string())
            .unwrap_or_default()
    };

    let mut svg = String::new();
    {
        let height = CHART_ROW * contributions.len() as u32 + 60;
        let root = SVGBackend::with_string(&mut svg, (CHART_WIDTH, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(320)
            .build_cartesian_2d(-span..span, (0..rows).into_segmented())?;

        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(contributions.len() + 1)
            .y_label_formatter(&|value| match value {
                SegmentValue::CenterOf(row) => label_at(*row),
                _ => String::new(),
            })
            .x_desc("Contribution to predicted risk")
            .draw()?;

        chart.draw_series(contributions.iter().enumerate().map(|(rank, c)| {
            let row = rows - 1 - rank as i32;
            let color = if c.increases_risk() { RISK_UP } else { RISK_DOWN };
            let mut bar = Rectangle::new(
                [(0.0, SegmentValue::Exact(row)), (c.contribution, SegmentValue::Exact(row + 1))],
                color.filled(),
            );
            bar.set_margin(3, 3, 0, 0);
            bar
        }))?;

        root.present()?;
    }
    Ok(svg)
}

fn result_section(report: &PredictionReport) -> String {
    let mut html = String::from("<section id=\"result\">\n<h2>Prediction</h2>\n");

    if let Some(warning) = &report.confidence.warning {
        let _ = write!(html, "<p class=\"warning\">{}</p>\n", esc(warning));
    }

    let _ = write!(
        html,
        "<div class=\"caption\">Predicted probability (0-1)</div>\n\
         <div class=\"metric\">{}</div>\n\
         <p><strong>As a percentage:</strong> {}</p>\n\
         <p class=\"caption\">HIGH/LOW is a decision label based on the threshold above (not a guarantee). \
         It flags whether the predicted probability crosses your chosen cutoff.</p>\n\
         <div class=\"verdict\" style=\"background: {}\">{}</div>\n",
        esc(&report.probability_display),
        esc(&report.percentage_display),
        report.label.color(),
        esc(&report.summary)
    );

    html.push_str("<details>\n<summary>Show raw model input (codes)</summary>\n<table>\n<tr><th>Column</th><th>Code</th><th>Label</th></tr>\n");
    for field in &report.fields {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            field.column,
            field.code,
            esc(field.label.unwrap_or(""))
        );
    }
    html.push_str("</table>\n</details>\n");

    html.push_str(
        "<h2>Why this prediction</h2>\n\
         <p class=\"caption\">Local explanation for THIS input. Bars to the right increase predicted risk; \
         bars to the left decrease it. Larger magnitude = stronger influence. \
         This is not causal: features can be signals of crash intensity or context.</p>\n",
    );
    html.push_str(&explanation_chart(&report.explanation));
    html.push_str("</section>\n");
    html
}

/// Full page: form, optional result, footer
pub fn page(form: &PredictForm, report: Option<&PredictionReport>, model: &ModelMetadata) -> String {
    let mut body = format!(
        "<h1>{}</h1>\n<p class=\"caption\">Predicts the probability that a crash results in severe injury \
         (incapacitated or fatal).</p>\n<p class=\"caption\">Model: {} ({}) · v{}</p>\n",
        esc(APP_NAME),
        esc(&model.name),
        esc(&model.format),
        APP_VERSION
    );
    body.push_str(&form_section(form));
    if let Some(report) = report {
        body.push_str(&result_section(report));
    }
    body.push_str(
        "<hr>\n<p class=\"caption\">Note: Labels shown are human-friendly; the model receives CRSS numeric codes.</p>\n",
    );
    layout(APP_NAME, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        "<h1>{}</h1>\n<p class=\"error\">{}</p>\n<p><a href=\"/\">Back to the form</a></p>\n",
        esc(APP_NAME),
        esc(message)
    );
    layout(&format!("{} - {}", APP_NAME, status.as_u16()), &body)
}
