//! Resolvers for the rule-based commands: informational answers and
//! search/open-site dispatch. None of these touch the conversation history.

use chrono::{DateTime, TimeZone};

use crate::response::{placeholder_image, AssistantResponse};
use crate::router::{InfoKind, SearchEngine};
use crate::system::LinkOpener;

/// Source of the weather sentence. The default is a canned report.
pub trait WeatherProvider: Send {
    fn report(&self) -> String;
}

pub struct CannedWeather {
    report: String,
}

impl CannedWeather {
    pub fn new(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
        }
    }
}

impl WeatherProvider for CannedWeather {
    fn report(&self) -> String {
        self.report.clone()
    }
}

/// `03:07 PM`
pub fn format_time<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%I:%M %p").to_string()
}

/// `Sunday, October 18, 2026`
pub fn format_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%A, %B %-d, %Y").to_string()
}

/// `Sunday, October 18`
pub fn format_short_date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%A, %B %-d").to_string()
}

pub fn informational<Tz: TimeZone>(
    kind: InfoKind,
    now: &DateTime<Tz>,
    weather: &dyn WeatherProvider,
) -> AssistantResponse
where
    Tz::Offset: std::fmt::Display,
{
    match kind {
        InfoKind::Time => AssistantResponse::text(format!("The current time is {}.", format_time(now)))
            .with_image(placeholder_image("02001a", "00e5ff", "Time"))
            .with_suggestions(["What is today's date?", "Set a timer for 5 minutes"]),
        InfoKind::Date => AssistantResponse::text(format!("Today is {}.", format_date(now)))
            .with_image(placeholder_image("02001a", "00e5ff", "Calendar"))
            .with_suggestions(["What is the weather?", "Any events today?"]),
        InfoKind::Weather => AssistantResponse::text(weather.report())
            .with_image(placeholder_image("02001a", "00e5ff", "Sunny"))
            .with_suggestions(["Is it going to rain?", "How is the traffic?"]),
    }
}

pub fn search_url(engine: SearchEngine, query: &str) -> String {
    let encoded = urlencoding::encode(query);
    match engine {
        SearchEngine::YouTube => format!("https://www.youtube.com/results?search_query={}", encoded),
        SearchEngine::Google => format!("https://www.google.com/search?q={}", encoded),
    }
}

pub fn site_url(host: &str) -> String {
    format!("https://{}", host)
}

/// Open the search results and confirm. Navigation failures are not reported.
pub fn dispatch_search(
    engine: SearchEngine,
    query: &str,
    opener: &mut dyn LinkOpener,
) -> AssistantResponse {
    log::info!("[Router] {} search: {:?}", engine.name(), query);
    opener.open(&search_url(engine, query));

    match engine {
        SearchEngine::YouTube => AssistantResponse::text(format!(
            "Searching YouTube for \"{}\". Please check the new tab for results.",
            query
        ))
        .with_image(placeholder_image("c4302b", "ffffff", "YouTube"))
        .with_suggestions(["Play another song", "What time is it?", "Search Google for news"]),
        SearchEngine::Google => {
            AssistantResponse::text(format!("Searching Google for \"{}\".", query))
        }
    }
}

pub fn dispatch_open_site(host: &str, opener: &mut dyn LinkOpener) -> AssistantResponse {
    log::info!("[Router] Opening site {}", host);
    opener.open(&site_url(host));
    AssistantResponse::text(format!("Opening {}.", host)).with_suggestions([
        "Search Google for \"AI news\"",
        "Search YouTube for tutorials",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::RecordingOpener;
    use chrono::{FixedOffset, TimeZone};

    fn afternoon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600 + 1800)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 18, 15, 7, 0)
            .unwrap()
    }

    #[test]
    fn time_is_twelve_hour_with_meridiem() {
        let response = informational(InfoKind::Time, &afternoon(), &CannedWeather::new("x"));
        assert_eq!(response.text, "The current time is 03:07 PM.");
        assert_eq!(response.suggestions.map(|s| s.len()), Some(2));
    }

    #[test]
    fn date_spells_weekday_and_month() {
        let response = informational(InfoKind::Date, &afternoon(), &CannedWeather::new("x"));
        assert_eq!(response.text, "Today is Sunday, October 18, 2026.");
        assert_eq!(format_short_date(&afternoon()), "Sunday, October 18");
    }

    #[test]
    fn weather_comes_from_provider() {
        let response = informational(
            InfoKind::Weather,
            &afternoon(),
            &CannedWeather::new("Foggy."),
        );
        assert_eq!(response.text, "Foggy.");
        assert!(response.image.is_some());
    }

    #[test]
    fn search_urls_encode_query() {
        assert_eq!(
            search_url(SearchEngine::YouTube, "lofi beats"),
            "https://www.youtube.com/results?search_query=lofi%20beats"
        );
        assert_eq!(
            search_url(SearchEngine::Google, "c++ & rust"),
            "https://www.google.com/search?q=c%2B%2B%20%26%20rust"
        );
        assert_eq!(search_url(SearchEngine::Google, ""), "https://www.google.com/search?q=");
    }

    #[test]
    fn dispatch_opens_and_confirms() {
        let mut opener = RecordingOpener::default();

        let youtube = dispatch_search(SearchEngine::YouTube, "despacito", &mut opener);
        assert!(youtube.text.starts_with("Searching YouTube for \"despacito\""));
        assert!(youtube.suggestions.is_some());

        let google = dispatch_search(SearchEngine::Google, "rust", &mut opener);
        assert_eq!(google.text, "Searching Google for \"rust\".");
        assert_eq!(google.image, None);
        assert_eq!(google.suggestions, None);

        let site = dispatch_open_site("wikipedia.com", &mut opener);
        assert_eq!(site.text, "Opening wikipedia.com.");

        assert_eq!(
            opener.urls(),
            vec![
                "https://www.youtube.com/results?search_query=despacito".to_string(),
                "https://www.google.com/search?q=rust".to_string(),
                "https://wikipedia.com".to_string(),
            ]
        );
    }
}
