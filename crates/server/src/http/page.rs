//! HTML for the listing page served at `/`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped when a file name becomes a single URL path segment.
/// Unreserved characters stay readable; `/`, `?`, `#` and `%` are encoded.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Script attached to the page. Clicking a download link sets its `password`
/// query parameter to whatever is typed in the download form.
const DOWNLOAD_SCRIPT: &str = r#"<script>
  const passwordInput = document.querySelector('#download-form input[name="password"]');

  document.addEventListener('click', (event) => {
    const link = event.target.closest('a.download-link');
    if (!link) {
      return;
    }

    const url = new URL(link.href);
    url.searchParams.set('password', passwordInput.value);
    link.href = url.toString();
  });
</script>"#;

/// Render the listing page for the given storage directory entries.
pub fn render_index(names: &[String]) -> String {
    let items: String = names
        .iter()
        .map(|name| {
            let href = escape_html(&download_href(name));
            let text = escape_html(name);
            format!(r#"<li><a href="{href}" class="download-link">{text}</a></li>"#)
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>filedrop</title>
</head>
<body>
<h1>Upload a file</h1>
<form action="/upload" method="post" enctype="multipart/form-data">
  <input type="password" name="password" placeholder="Password" required>
  <input type="file" name="file" required>
  <button type="submit">Upload</button>
</form>
<h1>Download a file</h1>
<form id="download-form">
  <input type="password" name="password" placeholder="Password" required>
</form>
<ul>{items}</ul>
{DOWNLOAD_SCRIPT}
</body>
</html>
"#
    )
}

/// Download route for a stored entry, with the name encoded as one path segment.
pub fn download_href(name: &str) -> String {
    format!("/download/{}", utf8_percent_encode(name, PATH_SEGMENT))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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
