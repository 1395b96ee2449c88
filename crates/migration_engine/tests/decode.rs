use migration_engine::decode_html;

#[test]
fn bom_wins_over_declared_charset() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice("<p>ação</p>".as_bytes());
    let decoded = decode_html(&bytes, Some("text/html; charset=iso-8859-1"));
    assert_eq!(decoded.encoding_label, "UTF-8");
    assert!(decoded.html.contains("ação"));
}

#[test]
fn header_charset_is_used() {
    let decoded = decode_html(b"<p>Gest\xe3o</p>", Some("text/html; charset=\"ISO-8859-1\""));
    assert_eq!(decoded.html, "<p>Gestão</p>");
    assert!(!decoded.had_errors);
}

#[test]
fn meta_charset_is_used_without_header() {
    let bytes = b"<html><head><meta charset=\"windows-1252\"></head><body>Gest\xe3o</body></html>";
    let decoded = decode_html(bytes, Some("text/html"));
    assert_eq!(decoded.encoding_label, "windows-1252");
    assert!(decoded.html.contains("Gestão"));
}

#[test]
fn malformed_utf8_is_replaced_not_rejected() {
    let decoded = decode_html(b"<p>ok \xff</p>", Some("text/html; charset=utf-8"));
    assert!(decoded.had_errors);
    assert!(decoded.html.contains('\u{FFFD}'));
}
