use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::extract::Forecast;

pub const ANALYST_NAME: &str = "Anthony";
pub const ANALYST_OUTLET: &str = "Deadline";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A tracked movie as stored in the `movies` table. Read-only here; the
/// table is maintained elsewhere.
#[derive(Debug, Clone, Deserialize)]
pub struct Movie {
    pub id: i64,
    pub title_en: String,
    pub release_date: String,
    pub status: String,
}

impl Movie {
    /// Whole days from `today` until release; negative once the release has
    /// passed. A malformed stored date is an error.
    pub fn days_to_release(&self, today: NaiveDate) -> Result<i64> {
        let release = NaiveDate::parse_from_str(&self.release_date, DATE_FORMAT)
            .with_context(|| {
                format!(
                    "movie {} has malformed release_date {:?}",
                    self.id, self.release_date
                )
            })?;
        Ok((release - today).num_days())
    }
}

/// One row for the insert-only `predictions` table. Field names match the
/// table columns.
#[derive(Debug, Serialize)]
pub struct PredictionRow {
    pub movie_id: i64,
    pub analyst_id: i64,
    pub scraped_date: String,
    pub days_to_release: i64,
    pub forecast_min: f64,
    pub forecast_max: f64,
    pub forecast_avg: f64,
}

impl PredictionRow {
    pub fn build(
        movie: &Movie,
        analyst_id: i64,
        forecast: &Forecast,
        today: NaiveDate,
    ) -> Result<PredictionRow> {
        Ok(PredictionRow {
            movie_id: movie.id,
            analyst_id,
            scraped_date: today.format(DATE_FORMAT).to_string(),
            days_to_release: movie.days_to_release(today)?,
            forecast_min: forecast.min,
            forecast_max: forecast.max,
            forecast_avg: forecast.avg,
        })
    }
}

/// Thin PostgREST client for the hosted Supabase tables.
pub struct Supabase {
    client: reqwest::Client,
    base_url: String,
    key: String,
}

impl Supabase {
    pub fn new(url: &str, key: &str) -> Self {
        Supabase {
            client: reqwest::Client::new(),
            base_url: format!("{}/rest/v1", url.trim_end_matches('/')),
            key: key.to_string(),
        }
    }

    fn get(&self, table: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{}", self.base_url, table))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    fn post(&self, table: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, table))
            .header("apikey", &self.key)
            .header("Authorization", format!("Bearer {}", self.key))
    }

    // `.query` percent-encodes the outlet, so a name with spaces or `&`
    // cannot corrupt the filter.
    fn analyst_lookup(&self, outlet: &str) -> reqwest::RequestBuilder {
        let filter = format!("eq.{}", outlet);
        self.get("analysts")
            .query(&[("select", "id"), ("outlet", filter.as_str())])
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("{} failed: HTTP {}: {}", what, status, body))
    }

    /// All movies with status "Tracking".
    pub async fn fetch_tracking_movies(&self) -> Result<Vec<Movie>> {
        let response = self
            .get("movies")
            .query(&[
                ("select", "id,title_en,release_date,status"),
                ("status", "eq.Tracking"),
            ])
            .send()
            .await
            .context("movies query failed")?;
        let movies: Vec<Movie> = Self::check(response, "movies query")
            .await?
            .json()
            .await
            .context("movies query returned invalid JSON")?;
        info!(count = movies.len(), "fetched tracked movies");
        Ok(movies)
    }

    /// Analyst id for `outlet`, inserting `{name, outlet}` on miss.
    ///
    /// Two-step check-then-act: not atomic, so two concurrent runs could both
    /// insert. Runs are serialized by the external scheduler; if that ever
    /// changes, put a uniqueness constraint on `analysts.outlet` and use a
    /// PostgREST upsert instead.
    pub async fn analyst_id_for_outlet(&self, name: &str, outlet: &str) -> Result<i64> {
        #[derive(Deserialize)]
        struct IdRow {
            id: i64,
        }

        let response = self
            .analyst_lookup(outlet)
            .send()
            .await
            .context("analyst lookup failed")?;
        let rows: Vec<IdRow> = Self::check(response, "analyst lookup")
            .await?
            .json()
            .await
            .context("analyst lookup returned invalid JSON")?;
        if let Some(row) = rows.first() {
            return Ok(row.id);
        }

        info!(%outlet, "analyst not found, creating");
        let response = self
            .post("analysts")
            .header("Prefer", "return=representation")
            .json(&json!({ "name": name, "outlet": outlet }))
            .send()
            .await
            .context("analyst insert failed")?;
        let created: Vec<IdRow> = Self::check(response, "analyst insert")
            .await?
            .json()
            .await
            .context("analyst insert returned invalid JSON")?;
        created
            .first()
            .map(|row| row.id)
            .ok_or_else(|| anyhow!("analyst insert returned no row"))
    }

    /// Insert one forecast record. Failures propagate and abort the run.
    pub async fn insert_prediction(&self, row: &PredictionRow) -> Result<()> {
        let response = self
            .post("predictions")
            .json(row)
            .send()
            .await
            .context("prediction insert failed")?;
        Self::check(response, "prediction insert").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(release_date: &str) -> Movie {
        Movie {
            id: 7,
            title_en: "Dune: Part Three".to_string(),
            release_date: release_date.to_string(),
            status: "Tracking".to_string(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn days_to_release_future() {
        assert_eq!(movie("2026-12-18").days_to_release(date("2026-12-01")).unwrap(), 17);
    }

    #[test]
    fn days_to_release_past_is_negative() {
        assert_eq!(movie("2026-12-18").days_to_release(date("2026-12-25")).unwrap(), -7);
    }

    #[test]
    fn days_to_release_today_is_zero() {
        assert_eq!(movie("2026-12-18").days_to_release(date("2026-12-18")).unwrap(), 0);
    }

    #[test]
    fn malformed_release_date_is_error() {
        let err = movie("Dec 18, 2026").days_to_release(date("2026-12-01")).unwrap_err();
        assert!(err.to_string().contains("malformed release_date"));
    }

    #[test]
    fn prediction_row_carries_forecast_verbatim() {
        let forecast = Forecast { min: 42.5, max: 57.5, avg: 50.0 };
        let row =
            PredictionRow::build(&movie("2026-12-18"), 3, &forecast, date("2026-12-01")).unwrap();
        assert_eq!(row.movie_id, 7);
        assert_eq!(row.analyst_id, 3);
        assert_eq!(row.scraped_date, "2026-12-01");
        assert_eq!(row.days_to_release, 17);
        assert_eq!(row.forecast_min, 42.5);
        assert_eq!(row.forecast_max, 57.5);
        assert_eq!(row.forecast_avg, 50.0);
    }

    #[test]
    fn prediction_row_serializes_to_table_columns() {
        let forecast = Forecast { min: 40.0, max: 60.0, avg: 50.0 };
        let row =
            PredictionRow::build(&movie("2026-12-18"), 3, &forecast, date("2026-12-01")).unwrap();
        let value = serde_json::to_value(&row).unwrap();
        let obj = value.as_object().unwrap();
        for column in [
            "movie_id",
            "analyst_id",
            "scraped_date",
            "days_to_release",
            "forecast_min",
            "forecast_max",
            "forecast_avg",
        ] {
            assert!(obj.contains_key(column), "missing column {}", column);
        }
        assert_eq!(obj.len(), 7);
        assert_eq!(value["scraped_date"], "2026-12-01");
    }

    #[test]
    fn base_url_trims_trailing_slash() {
        let db = Supabase::new("https://example.supabase.co/", "key");
        assert_eq!(db.base_url, "https://example.supabase.co/rest/v1");
    }

    #[test]
    fn analyst_lookup_encodes_outlet() {
        let db = Supabase::new("https://example.supabase.co", "key");
        let request = db.analyst_lookup("The Hollywood Reporter & Co").build().unwrap();
        let url = request.url();
        assert_eq!(url.path(), "/rest/v1/analysts");
        assert!(!url.as_str().contains(' '), "space survived encoding: {}", url);
        assert_eq!(url.query_pairs().count(), 2, "filter split on &: {}", url);
        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs[0], ("select".into(), "id".into()));
        assert_eq!(pairs[1], ("outlet".into(), "eq.The Hollywood Reporter & Co".into()));
    }
}
