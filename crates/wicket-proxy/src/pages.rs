//! HTML pages for the browser leg of the flow.
//!
//! Three small server-rendered pages: the user-code entry form, the
//! signed-in confirmation, and the error page. Dynamic values are
//! escaped before interpolation.

/// Renders the user-code entry form. `prefill` seeds the input field
/// when the verification link carried a `code` query parameter.
#[must_use]
pub fn device_page(prefill: &str) -> String {
    let code = html_escape::encode_double_quoted_attribute(prefill);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Enter Device Code</title>
    {STYLE}
</head>
<body>
    <div class="container">
        <h1>Enter Device Code</h1>
        <p>Enter the code shown on your device to continue signing in.</p>
        <form action="/auth/verify_code" method="GET">
            <input type="text" name="code" value="{code}"
                   placeholder="XXXX-XXXX" autocomplete="off" autofocus>
            <button type="submit">Continue</button>
        </form>
    </div>
</body>
</html>
"#
    )
}

/// Renders the success page shown after the token was captured.
#[must_use]
pub fn signed_in_page() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Signed In</title>
    {STYLE}
</head>
<body>
    <div class="container">
        <h1>Signed In</h1>
        <p>Your device will finish signing in within a few seconds.</p>
        <p class="dim">You can close this window.</p>
    </div>
</body>
</html>
"#
    )
}

/// Renders the error page shown when the upstream refused the token
/// exchange. The raw upstream body is included as diagnostic text.
#[must_use]
pub fn error_page(upstream_body: &str) -> String {
    let diagnostic = html_escape::encode_text(upstream_body);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Error</title>
    {STYLE}
</head>
<body>
    <div class="container">
        <h1>Error Logging In</h1>
        <p>There was an error getting an access token from the service.</p>
        <pre>{diagnostic}</pre>
    </div>
</body>
</html>
"#
    )
}

const STYLE: &str = r#"<style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            min-height: 100vh;
            margin: 0;
            background: #f4f4f5;
            color: #18181b;
        }
        .container {
            text-align: center;
            background: #ffffff;
            padding: 3rem;
            border-radius: 12px;
            box-shadow: 0 4px 12px rgba(0, 0, 0, 0.08);
            max-width: 480px;
        }
        input {
            font-size: 1.4rem;
            letter-spacing: 0.2em;
            text-align: center;
            text-transform: uppercase;
            padding: 0.5rem;
            margin: 1rem 0;
            width: 12ch;
        }
        button {
            display: block;
            margin: 0 auto;
            font-size: 1rem;
            padding: 0.6rem 2rem;
            cursor: pointer;
        }
        pre {
            text-align: left;
            background: #f4f4f5;
            padding: 1rem;
            border-radius: 8px;
            overflow-x: auto;
        }
        .dim { opacity: 0.6; font-size: 0.9rem; }
    </style>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_page_prefills_code() {
        let page = device_page("ABCD-1234");
        assert!(page.contains(r#"value="ABCD-1234""#));
        assert!(page.contains(r#"action="/auth/verify_code""#));
        assert!(page.contains("Enter Device Code"));
    }

    #[test]
    fn test_device_page_escapes_prefill() {
        let page = device_page(r#""><script>alert(1)</script>"#);
        assert!(!page.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn test_signed_in_page() {
        let page = signed_in_page();
        assert!(page.contains("Signed In"));
    }

    #[test]
    fn test_error_page_escapes_upstream_body() {
        let page = error_page(r#"{"error":"invalid_grant"}<img src=x>"#);
        assert!(page.contains("Error Logging In"));
        assert!(page.contains("invalid_grant"));
        assert!(!page.contains("<img src=x>"));
    }
}
