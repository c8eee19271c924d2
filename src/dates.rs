use chrono::{Datelike, Duration, NaiveDate, Weekday};

/// Normalize any supported date spelling to ISO `YYYY-MM-DD`.
///
/// Idempotent: normalizing an already-ISO string returns it unchanged.
/// Supported inputs: ISO, `DD.MM.YYYY`, `MM/DD/YYYY`, "June 25, 2026",
/// "25 June 2026", "25. Juni 2026".
pub fn normalize(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("not specified") {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
        return Some(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(d.format("%Y-%m-%d").to_string());
    }

    parse_verbal(s)
}

/// "June 25, 2026" / "25 June 2026" / "25. Juni 2026" → ISO.
fn parse_verbal(s: &str) -> Option<String> {
    let cleaned: String = s
        .chars()
        .map(|c| if c == ',' || c == '.' { ' ' } else { c })
        .collect();
    let tokens: Vec<&str> = cleaned.split_whitespace().collect();

    let mut month: Option<u32> = None;
    let mut day: Option<u32> = None;
    let mut year: Option<i32> = None;

    for tok in &tokens {
        if let Some(m) = month_number(tok) {
            month = month.or(Some(m));
        } else if let Ok(n) = tok.parse::<u32>() {
            if (1000..=9999).contains(&n) {
                year = year.or(Some(n as i32));
            } else if (1..=31).contains(&n) {
                day = day.or(Some(n));
            }
        }
    }

    NaiveDate::from_ymd_opt(year?, month?, day?).map(|d| d.format("%Y-%m-%d").to_string())
}

pub fn month_number(token: &str) -> Option<u32> {
    let t = token.to_lowercase();
    let months = [
        ("january", 1u32), ("januar", 1), ("february", 2), ("februar", 2),
        ("march", 3), ("märz", 3), ("maerz", 3), ("april", 4),
        ("may", 5), ("mai", 5), ("june", 6), ("juni", 6),
        ("july", 7), ("juli", 7), ("august", 8),
        ("september", 9), ("october", 10), ("oktober", 10),
        ("november", 11), ("december", 12), ("dezember", 12),
    ];
    months
        .iter()
        .find(|(name, _)| t == *name || (t.len() >= 3 && name.starts_with(&t)))
        .map(|(_, n)| *n)
}

pub fn weekday_from_name(token: &str) -> Option<Weekday> {
    match token.to_lowercase().as_str() {
        "monday" | "montag" => Some(Weekday::Mon),
        "tuesday" | "dienstag" => Some(Weekday::Tue),
        "wednesday" | "mittwoch" => Some(Weekday::Wed),
        "thursday" | "donnerstag" => Some(Weekday::Thu),
        "friday" | "freitag" => Some(Weekday::Fri),
        "saturday" | "samstag" => Some(Weekday::Sat),
        "sunday" | "sonntag" => Some(Weekday::Sun),
        _ => None,
    }
}

pub fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

pub fn parse_iso(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

pub fn is_past(iso: &str, today: NaiveDate) -> bool {
    parse_iso(iso).is_some_and(|d| d < today)
}

/// The next `count` future dates falling on `weekday`, starting after `from`.
pub fn next_weekdays(from: NaiveDate, weekday: Weekday, count: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(count);
    let mut d = from + Duration::days(1);
    while out.len() < count {
        if d.weekday() == weekday {
            out.push(d.format("%Y-%m-%d").to_string());
        }
        d += Duration::days(1);
    }
    out
}

/// Candidate weekdays (Mon-Fri) within the next `horizon_days`, capped.
pub fn upcoming_business_days(from: NaiveDate, horizon_days: i64, cap: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut d = from + Duration::days(1);
    let end = from + Duration::days(horizon_days);
    while d <= end && out.len() < cap {
        if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
            out.push(d.format("%Y-%m-%d").to_string());
        }
        d += Duration::days(1);
    }
    out
}

/// Deposit due date: max(today + 1, event_date − deadline_days).
pub fn deposit_due_date(today: NaiveDate, event_date: &str, deadline_days: i64) -> String {
    let earliest = today + Duration::days(1);
    let due = parse_iso(event_date)
        .map(|d| d - Duration::days(deadline_days))
        .filter(|d| *d > earliest)
        .unwrap_or(earliest);
    due.format("%Y-%m-%d").to_string()
}

/// Display form used in client-facing messages ("June 25, 2026").
pub fn display(iso: &str) -> String {
    parse_iso(iso)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| iso.to_string())
}
