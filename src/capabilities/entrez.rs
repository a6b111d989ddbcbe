//! PubMed search capability backed by the NCBI E-utilities API.
//!
//! One batch is two upstream calls: ESearch resolves PMIDs (plus the total
//! match count) for a paginated window, EFetch expands them into structured
//! summaries.

use std::sync::Arc;

use async_trait::async_trait;
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::capabilities::{BatchPage, BatchQuery, CapabilityError, SearchCapability};
use crate::models::{Article, ArticleBuilder};
use crate::utils::HttpClient;

const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const EFETCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/efetch.fcgi";

/// E-utilities allow 3 requests/second without an API key
const EUTILS_REQUESTS_PER_SECOND: u32 = 3;

/// PubMed search capability
///
/// Both request-level filters are applied upstream by rewriting the query
/// term (`NOT preprint[pt]`, `AND free full text[filter]`), so
/// `supports_filter` keeps its default of `true`.
#[derive(Debug, Clone)]
pub struct EntrezSearch {
    client: Arc<HttpClient>,
    esearch_url: String,
    efetch_url: String,
    api_key: Option<String>,
}

impl EntrezSearch {
    /// Create a new capability with a paced HTTP client
    pub fn new() -> Result<Self, CapabilityError> {
        let client = HttpClient::builder()
            .requests_per_second(EUTILS_REQUESTS_PER_SECOND)
            .build()?;
        Ok(Self::with_client(Arc::new(client)))
    }

    /// Create with a custom HTTP client
    pub fn with_client(client: Arc<HttpClient>) -> Self {
        Self {
            client,
            esearch_url: ESEARCH_URL.to_string(),
            efetch_url: EFETCH_URL.to_string(),
            api_key: None,
        }
    }

    /// Override the E-utilities endpoints (for testing against a local server)
    pub fn with_base_urls(
        mut self,
        esearch_url: impl Into<String>,
        efetch_url: impl Into<String>,
    ) -> Self {
        self.esearch_url = esearch_url.into();
        self.efetch_url = efetch_url.into();
        self
    }

    /// Attach an NCBI API key (raises the upstream rate limit)
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Rewrite the query term with the request-level filters
    fn build_term(batch: &BatchQuery) -> String {
        let mut term = format!("({})", batch.query);
        if batch.filters.exclude_preprints {
            term.push_str(" NOT preprint[pt]");
        }
        if batch.filters.free_full_text_only {
            term.push_str(" AND free full text[filter]");
        }
        term
    }

    /// Build the ESearch URL for one paginated window
    fn build_search_url(&self, batch: &BatchQuery) -> String {
        let mut params = vec![
            ("db".to_string(), "pubmed".to_string()),
            ("term".to_string(), Self::build_term(batch)),
            ("retstart".to_string(), batch.offset.to_string()),
            ("retmax".to_string(), batch.count.to_string()),
            ("retmode".to_string(), "xml".to_string()),
            ("datetype".to_string(), "pdat".to_string()),
            ("mindate".to_string(), batch.date_range.start.clone()),
            ("maxdate".to_string(), batch.date_range.end.clone()),
        ];

        if let Some(key) = &self.api_key {
            params.push(("api_key".to_string(), key.clone()));
        }

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.esearch_url, query_string)
    }

    /// Build the EFetch URL for specific PMIDs
    fn build_fetch_url(&self, ids: &[String]) -> String {
        let mut url = format!(
            "{}?db=pubmed&id={}&retmode=xml",
            self.efetch_url,
            ids.join(",")
        );
        if let Some(key) = &self.api_key {
            url.push_str("&api_key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }

    /// Strip control characters E-utilities sometimes leak into XML payloads
    fn sanitize_xml(xml: &str) -> String {
        let invalid = regex::Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]")
            .expect("control-character pattern is valid");
        invalid.replace_all(xml, "").into_owned()
    }

    /// Parse the ESearch response into (pmids, total_available)
    fn parse_search_response(xml: &str) -> Result<(Vec<String>, usize), CapabilityError> {
        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ESearchResult {
            Count: usize,
            IdList: Option<IdList>,
        }

        #[derive(Debug, Deserialize)]
        struct IdList {
            #[serde(rename = "Id", default)]
            ids: Vec<String>,
        }

        let result: ESearchResult = from_str(xml)
            .map_err(|e| CapabilityError::Parse(format!("ESearch XML: {}", e)))?;

        let ids = result.IdList.map(|list| list.ids).unwrap_or_default();
        Ok((ids, result.Count))
    }

    /// Parse the EFetch response into structured summaries
    fn parse_fetch_response(xml: &str) -> Result<Vec<Article>, CapabilityError> {
        #[derive(Debug, Deserialize)]
        struct TextValue {
            #[serde(rename = "$text")]
            value: String,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubmedArticleSet {
            #[serde(rename = "PubmedArticle", default)]
            articles: Vec<PubmedArticleXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubmedArticleXml {
            MedlineCitation: Option<MedlineCitation>,
            PubmedData: Option<PubmedData>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct MedlineCitation {
            PMID: Option<TextValue>,
            Article: Option<ArticleXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ArticleXml {
            Journal: Option<JournalXml>,
            ArticleTitle: Option<TextValue>,
            Abstract: Option<AbstractXml>,
            AuthorList: Option<AuthorListXml>,
            ArticleDate: Option<ArticleDateXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct JournalXml {
            Title: Option<TextValue>,
            JournalIssue: Option<JournalIssueXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct JournalIssueXml {
            PubDate: Option<PubDateXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubDateXml {
            Year: Option<String>,
            MedlineDate: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ArticleDateXml {
            Year: Option<String>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct AbstractXml {
            #[serde(rename = "AbstractText", default)]
            sections: Vec<TextValue>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct AuthorListXml {
            #[serde(rename = "Author", default)]
            authors: Vec<AuthorXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct AuthorXml {
            LastName: Option<TextValue>,
            ForeName: Option<TextValue>,
            Initials: Option<TextValue>,
            CollectiveName: Option<TextValue>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct PubmedData {
            ArticleIdList: Option<ArticleIdListXml>,
        }

        #[derive(Debug, Deserialize)]
        #[allow(non_snake_case)]
        struct ArticleIdListXml {
            #[serde(rename = "ArticleId", default)]
            ids: Vec<ArticleIdXml>,
        }

        #[derive(Debug, Deserialize)]
        struct ArticleIdXml {
            #[serde(rename = "@IdType")]
            id_type: String,
            #[serde(rename = "$text", default)]
            value: String,
        }

        let result: PubmedArticleSet = from_str(xml)
            .map_err(|e| CapabilityError::Parse(format!("EFetch XML: {}", e)))?;

        let mut articles = Vec::with_capacity(result.articles.len());

        for entry in result.articles {
            let citation = entry.MedlineCitation.as_ref();

            let Some(pmid) = citation
                .and_then(|m| m.PMID.as_ref())
                .map(|p| p.value.trim().to_string())
                .filter(|p| !p.is_empty())
            else {
                // A record without a PMID has no identity in the store
                tracing::debug!("skipping EFetch record without a PMID");
                continue;
            };

            let article_xml = citation.and_then(|m| m.Article.as_ref());

            let title = article_xml
                .and_then(|a| a.ArticleTitle.as_ref())
                .map(|t| collapse_whitespace(&t.value))
                .unwrap_or_default();

            let author_names: Vec<(Option<String>, Option<String>, Option<String>)> = article_xml
                .and_then(|a| a.AuthorList.as_ref())
                .map(|list| {
                    list.authors
                        .iter()
                        .map(|author| {
                            if let Some(collective) = &author.CollectiveName {
                                (None, Some(collective.value.clone()), None)
                            } else {
                                (
                                    author.ForeName.as_ref().map(|f| f.value.clone()),
                                    author.LastName.as_ref().map(|l| l.value.clone()),
                                    author.Initials.as_ref().map(|i| i.value.clone()),
                                )
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();

            let authors = author_names
                .iter()
                .filter_map(|(fore, last, _)| match (fore, last) {
                    (Some(fore), Some(last)) => Some(format!("{} {}", fore, last)),
                    (None, Some(last)) => Some(last.clone()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("; ");

            let first_author = author_names
                .first()
                .map(|(fore, last, initials)| {
                    first_author_display(fore.as_deref(), last.as_deref(), initials.as_deref())
                })
                .unwrap_or_default();

            let summary = article_xml
                .and_then(|a| a.Abstract.as_ref())
                .map(|sections| {
                    collapse_whitespace(
                        &sections
                            .sections
                            .iter()
                            .map(|s| s.value.as_str())
                            .collect::<Vec<_>>()
                            .join(" "),
                    )
                })
                .unwrap_or_default();

            let journal = article_xml
                .and_then(|a| a.Journal.as_ref())
                .and_then(|j| j.Title.as_ref())
                .map(|t| collapse_whitespace(&t.value))
                .unwrap_or_default();

            let year = article_xml
                .and_then(|a| a.Journal.as_ref())
                .and_then(|j| j.JournalIssue.as_ref())
                .and_then(|issue| issue.PubDate.as_ref())
                .and_then(|date| {
                    date.Year
                        .as_deref()
                        .and_then(parse_year)
                        .or_else(|| date.MedlineDate.as_deref().and_then(parse_year))
                })
                .or_else(|| {
                    article_xml
                        .and_then(|a| a.ArticleDate.as_ref())
                        .and_then(|d| d.Year.as_deref())
                        .and_then(parse_year)
                })
                .unwrap_or(0);

            let pmcid = entry
                .PubmedData
                .as_ref()
                .and_then(|data| data.ArticleIdList.as_ref())
                .and_then(|list| list.ids.iter().find(|id| id.id_type == "pmc"))
                .map(|id| id.value.trim().to_string())
                .filter(|id| !id.is_empty());

            let mut builder = ArticleBuilder::new(pmid, title)
                .authors(authors)
                .first_author(first_author)
                .year(year)
                .journal(journal)
                .summary(summary);
            if let Some(pmcid) = pmcid {
                builder = builder.pmcid(pmcid);
            }

            articles.push(builder.build());
        }

        Ok(articles)
    }

    async fn get_text(&self, url: &str, context: &str) -> Result<String, CapabilityError> {
        let response = self.client.get(url).await.map_err(CapabilityError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::from_status(status, context));
        }

        response.text().await.map_err(CapabilityError::from)
    }
}

/// Format a first author as "Lastname, F."
fn first_author_display(
    fore_name: Option<&str>,
    last_name: Option<&str>,
    initials: Option<&str>,
) -> String {
    let Some(last) = last_name.map(str::trim).filter(|l| !l.is_empty()) else {
        // Collective names carry the full display form in the last slot,
        // so this is only reached for fully empty author entries
        return String::new();
    };

    let initial = initials
        .and_then(|i| i.chars().next())
        .or_else(|| fore_name.and_then(|f| f.trim().chars().next()));

    match initial {
        Some(initial) => format!("{}, {}.", last, initial),
        None => last.to_string(),
    }
}

/// Collapse runs of whitespace into single spaces
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract a leading 4-digit year from a date string like "2020" or "2020 Jan-Feb"
fn parse_year(text: &str) -> Option<i32> {
    let digits: String = text.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() == 4 {
        digits.parse().ok()
    } else {
        None
    }
}

#[async_trait]
impl SearchCapability for EntrezSearch {
    async fn query(&self, batch: &BatchQuery) -> Result<BatchPage, CapabilityError> {
        let search_url = self.build_search_url(batch);
        let search_xml = self.get_text(&search_url, "ESearch").await?;
        let (ids, total_available) = Self::parse_search_response(&search_xml)?;

        tracing::debug!(
            offset = batch.offset,
            count = batch.count,
            found = ids.len(),
            total_available,
            "ESearch window resolved"
        );

        if ids.is_empty() {
            return Ok(BatchPage {
                articles: Vec::new(),
                total_available,
            });
        }

        let fetch_url = self.build_fetch_url(&ids);
        let fetch_xml = self.get_text(&fetch_url, "EFetch").await?;
        let articles = Self::parse_fetch_response(&Self::sanitize_xml(&fetch_xml))?;

        Ok(BatchPage {
            articles,
            total_available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{DateRange, SearchFilters};

    fn batch(query: &str) -> BatchQuery {
        BatchQuery {
            query: query.to_string(),
            date_range: DateRange {
                start: "1900/01/01".to_string(),
                end: "3000/01/01".to_string(),
            },
            filters: SearchFilters {
                exclude_preprints: true,
                free_full_text_only: false,
            },
            offset: 50,
            count: 25,
        }
    }

    const ESEARCH_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<eSearchResult>
  <Count>120</Count>
  <RetMax>2</RetMax>
  <RetStart>50</RetStart>
  <IdList>
    <Id>11111111</Id>
    <Id>22222222</Id>
  </IdList>
</eSearchResult>"#;

    const EFETCH_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">11111111</PMID>
      <Article>
        <Journal>
          <Title>Nature Microbiology</Title>
          <JournalIssue>
            <PubDate><Year>2021</Year></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>Soil   microbiome dynamics</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Part one.</AbstractText>
          <AbstractText Label="RESULTS">Part two.</AbstractText>
        </Abstract>
        <AuthorList>
          <Author><LastName>Doe</LastName><ForeName>Jane</ForeName><Initials>J</Initials></Author>
          <Author><LastName>Smith</LastName><ForeName>John</ForeName><Initials>J</Initials></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="doi">10.1000/test</ArticleId>
        <ArticleId IdType="pmc">PMC7654321</ArticleId>
      </ArticleIdList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID Version="1">22222222</PMID>
      <Article>
        <Journal>
          <Title>Annals of Testing</Title>
          <JournalIssue>
            <PubDate><MedlineDate>2019 Jan-Feb</MedlineDate></PubDate>
          </JournalIssue>
        </Journal>
        <ArticleTitle>A second record</ArticleTitle>
        <AuthorList>
          <Author><CollectiveName>The Testing Consortium</CollectiveName></Author>
        </AuthorList>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn test_build_term_applies_filters() {
        let mut b = batch("cancer[TIAB]");
        assert_eq!(
            EntrezSearch::build_term(&b),
            "(cancer[TIAB]) NOT preprint[pt]"
        );

        b.filters.free_full_text_only = true;
        assert_eq!(
            EntrezSearch::build_term(&b),
            "(cancer[TIAB]) NOT preprint[pt] AND free full text[filter]"
        );

        b.filters.exclude_preprints = false;
        b.filters.free_full_text_only = false;
        assert_eq!(EntrezSearch::build_term(&b), "(cancer[TIAB])");
    }

    #[test]
    fn test_build_search_url() {
        let capability =
            EntrezSearch::with_client(Arc::new(HttpClient::new().unwrap())).with_api_key("k123");
        let url = capability.build_search_url(&batch("cancer[TIAB]"));

        assert!(url.starts_with(ESEARCH_URL));
        assert!(url.contains("db=pubmed"));
        assert!(url.contains("retstart=50"));
        assert!(url.contains("retmax=25"));
        assert!(url.contains("datetype=pdat"));
        assert!(url.contains("mindate=1900%2F01%2F01"));
        assert!(url.contains("api_key=k123"));
        assert!(url.contains("NOT%20preprint%5Bpt%5D"));
    }

    #[test]
    fn test_parse_search_response() {
        let (ids, total) = EntrezSearch::parse_search_response(ESEARCH_FIXTURE).unwrap();
        assert_eq!(ids, vec!["11111111", "22222222"]);
        assert_eq!(total, 120);
    }

    #[test]
    fn test_parse_search_response_empty() {
        let xml = "<eSearchResult><Count>0</Count><IdList></IdList></eSearchResult>";
        let (ids, total) = EntrezSearch::parse_search_response(xml).unwrap();
        assert!(ids.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn test_parse_fetch_response() {
        let articles = EntrezSearch::parse_fetch_response(EFETCH_FIXTURE).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.pmid, "11111111");
        assert_eq!(first.title, "Soil microbiome dynamics");
        assert_eq!(first.authors, "Jane Doe; John Smith");
        assert_eq!(first.first_author, "Doe, J.");
        assert_eq!(first.year, 2021);
        assert_eq!(first.journal, "Nature Microbiology");
        assert_eq!(first.summary, "Part one. Part two.");
        assert_eq!(first.pmcid.as_deref(), Some("PMC7654321"));

        let second = &articles[1];
        assert_eq!(second.year, 2019);
        assert_eq!(second.authors, "The Testing Consortium");
        assert!(second.pmcid.is_none());
    }

    #[test]
    fn test_sanitize_xml_strips_control_characters() {
        let dirty = "<a>te\u{0008}xt</a>";
        assert_eq!(EntrezSearch::sanitize_xml(dirty), "<a>text</a>");
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2020"), Some(2020));
        assert_eq!(parse_year("2019 Jan-Feb"), Some(2019));
        assert_eq!(parse_year("Winter 2019"), None);
        assert_eq!(parse_year(""), None);
    }

    #[test]
    fn test_first_author_display() {
        assert_eq!(
            first_author_display(Some("Jane"), Some("Doe"), Some("JA")),
            "Doe, J."
        );
        assert_eq!(first_author_display(Some("Jane"), Some("Doe"), None), "Doe, J.");
        assert_eq!(first_author_display(None, Some("Doe"), None), "Doe");
        assert_eq!(first_author_display(None, None, None), "");
    }

    #[tokio::test]
    async fn test_query_against_mock_server() {
        let mut server = mockito::Server::new_async().await;

        let esearch = server
            .mock("GET", mockito::Matcher::Regex("^/esearch".to_string()))
            .with_status(200)
            .with_body(ESEARCH_FIXTURE)
            .create_async()
            .await;
        let efetch = server
            .mock("GET", mockito::Matcher::Regex("^/efetch".to_string()))
            .with_status(200)
            .with_body(EFETCH_FIXTURE)
            .create_async()
            .await;

        let capability = EntrezSearch::with_client(Arc::new(HttpClient::new().unwrap()))
            .with_base_urls(
                format!("{}/esearch.fcgi", server.url()),
                format!("{}/efetch.fcgi", server.url()),
            );

        let page = capability.query(&batch("cancer[TIAB]")).await.unwrap();
        assert_eq!(page.total_available, 120);
        assert_eq!(page.articles.len(), 2);
        assert_eq!(page.articles[0].pmid, "11111111");

        esearch.assert_async().await;
        efetch.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_status_maps_to_rate_limit() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", mockito::Matcher::Regex("^/esearch".to_string()))
            .with_status(429)
            .create_async()
            .await;

        let capability = EntrezSearch::with_client(Arc::new(HttpClient::new().unwrap()))
            .with_base_urls(
                format!("{}/esearch.fcgi", server.url()),
                format!("{}/efetch.fcgi", server.url()),
            );

        let err = capability.query(&batch("q")).await.unwrap_err();
        assert!(matches!(err, CapabilityError::RateLimit));
    }
}
