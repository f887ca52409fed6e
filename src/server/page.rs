//! 上传表单页面

use std::fmt::Write;

use super::types::Submission;
use crate::image::ImageFormat;
use crate::workflow::{ComparisonResult, FaceMatch, Outcome};

pub const INCOMPLETE_NOTICE: &str = "Please upload both images to compare.";
pub const NO_MATCH_NOTICE: &str = "No match found.";
pub const FAILURE_NOTICE: &str = "An error occurred while processing the images.";

/// 整数分数也保留一位小数，如 `100.0%`
pub fn similarity_line(m: &FaceMatch) -> String {
    if m.similarity.fract() == 0.0 {
        format!("Similarity: {:.1}%", m.similarity)
    } else {
        format!("Similarity: {}%", m.similarity)
    }
}

pub fn failure_line(message: &str) -> String {
    format!("Error comparing images: {message}")
}

const STYLE: &str = r#"
body { background-color: #f0f2f6; color: #333; font-family: Arial, sans-serif; max-width: 46rem; margin: 2rem auto; }
h1, h4 { color: #1f77b4; text-align: center; }
.upload { border: 2px dashed #1f77b4; padding: 10px; background-color: #fff; border-radius: 10px; margin: 10px 0; }
button { background-color: #1f77b4; color: #fff; border: 0; border-radius: 10px; padding: 10px 20px; font-size: 16px; margin-top: 20px; }
button:disabled { background-color: #9bbcd8; }
.notice { padding: 10px; border-radius: 6px; margin: 8px 0; text-align: center; font-size: 18px; }
.success { background-color: #e1f5e4; }
.error { background-color: #fde2e2; }
.warning { background-color: #fff5d6; }
#busy { display: none; text-align: center; }
footer { text-align: center; margin-top: 2rem; }
"#;

/// 按钮只有在两个文件都选中后才可用，提交时显示进度提示
const SCRIPT: &str = r#"
const form = document.getElementById("compare-form");
const button = document.getElementById("compare-button");
const warning = document.getElementById("incomplete");
function refresh() {
  const ready = form.source.files.length > 0 && form.target.files.length > 0;
  button.disabled = !ready;
  warning.style.display = ready ? "none" : "block";
}
form.source.addEventListener("change", refresh);
form.target.addEventListener("change", refresh);
form.addEventListener("submit", () => {
  button.disabled = true;
  document.getElementById("busy").style.display = "block";
});
refresh();
"#;

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn notice(out: &mut String, class: &str, text: &str) {
    let _ = writeln!(out, r#"<div class="notice {class}">{}</div>"#, escape(text));
}

/// 渲染结果区域
pub fn render_result(submission: &Submission) -> String {
    let mut out = String::new();
    match submission {
        Submission::Rejected(errors) => {
            for e in errors {
                notice(&mut out, "warning", &e.to_string());
            }
        }
        Submission::Finished(Outcome::IncompleteInput) => {
            notice(&mut out, "warning", INCOMPLETE_NOTICE);
        }
        Submission::Finished(Outcome::Completed(result)) => {
            out.push_str("<h3>Results:</h3>\n");
            match result {
                ComparisonResult::Matches(matches) => {
                    for m in matches {
                        notice(&mut out, "success", &similarity_line(m));
                    }
                }
                ComparisonResult::NoMatch => notice(&mut out, "error", NO_MATCH_NOTICE),
                ComparisonResult::Failure(e) => {
                    notice(&mut out, "error", &failure_line(e));
                    notice(&mut out, "error", FAILURE_NOTICE);
                }
            }
        }
    }
    out
}

/// 渲染完整页面，`submission` 为空时只显示表单
pub fn render(submission: Option<&Submission>) -> String {
    let accept = ImageFormat::EXTENSIONS.iter().map(|e| format!(".{e}")).collect::<Vec<_>>().join(",");
    let result = submission.map(render_result).unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Image Similarity Check</title>
<style>{STYLE}</style>
</head>
<body>
<h1>Image Similarity Check</h1>
<h4>Using AWS Rekognition</h4>
<h3>Upload Your Images Below:</h3>
<form id="compare-form" method="post" action="/compare" enctype="multipart/form-data">
<div class="upload"><label>Upload First Image <input type="file" name="source" accept="{accept}"></label></div>
<div class="upload"><label>Upload Second Image <input type="file" name="target" accept="{accept}"></label></div>
<button id="compare-button" type="submit">Compare Images</button>
</form>
<div id="busy">Comparing Images...</div>
<div id="incomplete" class="notice warning">{INCOMPLETE_NOTICE}</div>
<section id="result">
{result}</section>
<hr>
<footer>Powered by AWS Rekognition</footer>
<script>{SCRIPT}</script>
</body>
</html>
"#
    )
}
