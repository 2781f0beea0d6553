//! Salesforce CRM connector — policies are modelled as renewal
//! Opportunities and fetched with SOQL. Read-only; the connector never
//! writes back.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::error::ConnectorError;
use crate::model::{Policy, Snippet};
use crate::traits::{Connector, CrmConnector};

const API_VERSION: &str = "v58.0";

/// Settings for the Salesforce connector.
#[derive(Debug, Clone)]
pub struct SalesforceSettings {
    pub access_token: String,
    /// Instance URL from the OAuth token response,
    /// e.g. `https://mycompany.my.salesforce.com`.
    pub instance_url: String,
}

pub struct SalesforceConnector {
    http: reqwest::Client,
    settings: SalesforceSettings,
}

impl SalesforceConnector {
    pub const NAME: &'static str = "salesforce";

    pub fn new(settings: SalesforceSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn query_url(&self) -> String {
        format!(
            "{}/services/data/{}/query/",
            self.settings.instance_url, API_VERSION
        )
    }

    fn record_link(&self, record_id: &str) -> String {
        format!("{}/lightning/r/Opportunity/{record_id}/view", self.settings.instance_url)
    }

    async fn soql(&self, query: &str) -> Result<Value, ConnectorError> {
        debug!(source = Self::NAME, "executing SOQL query");
        let resp = self
            .http
            .get(self.query_url())
            .bearer_auth(&self.settings.access_token)
            .query(&[("q", query)])
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 401 {
            return Err(ConnectorError::AuthRequired(
                "salesforce: access token expired or invalid".into(),
            ));
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ConnectorError::Http {
                status: status.as_u16(),
                message,
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ConnectorError::Decode(e.to_string()))
    }
}

/// Days from `today` to an RFC 3339 date string, floored at zero.
/// Unparseable dates count as zero days (expiring now).
pub fn days_until(date: &str, today: NaiveDate) -> u32 {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(d) => (d - today).num_days().max(0) as u32,
        Err(_) => 0,
    }
}

/// Map one Opportunity record to a [`Policy`].
///
/// `today` is passed in so the mapping stays a pure function.
pub fn map_opportunity(record: &Value, link: Option<String>, today: NaiveDate) -> Option<Policy> {
    let id = record["Id"].as_str()?.to_string();
    let close_date = record["CloseDate"].as_str().unwrap_or_default().to_string();
    Some(Policy {
        policy_number: record["Name"].as_str().unwrap_or(&id).to_string(),
        client_name: record["Account"]["Name"].as_str().unwrap_or_default().to_string(),
        premium_at_risk: record["Amount"].as_f64().unwrap_or(0.0),
        days_to_expiry: days_until(&close_date, today),
        expiry_date: close_date,
        claims_frequency: record["Claims_Frequency__c"].as_u64().unwrap_or(0) as u32,
        policy_type: record["Type"].as_str().map(String::from),
        assignee: record["Owner"]["Name"].as_str().map(String::from),
        link,
        id,
    })
}

const POLICY_FIELDS: &str = "Id, Name, Amount, StageName, CloseDate, \
     Account.Name, Account.Id, Owner.Name, Type, Claims_Frequency__c";

#[async_trait::async_trait]
impl CrmConnector for SalesforceConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn fetch_policy(&self, policy_id: &str) -> Result<Policy, ConnectorError> {
        // SOQL has no parameter binding over REST; ids are restricted to
        // alphanumerics before interpolation.
        if !policy_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConnectorError::Decode(format!(
                "invalid salesforce record id: {policy_id}"
            )));
        }
        let query = format!("SELECT {POLICY_FIELDS} FROM Opportunity WHERE Id = '{policy_id}'");
        let body = self.soql(&query).await?;
        let today = chrono::Utc::now().date_naive();
        body["records"]
            .as_array()
            .and_then(|rs| rs.first())
            .and_then(|r| {
                let id = r["Id"].as_str()?;
                map_opportunity(r, Some(self.record_link(id)), today)
            })
            .ok_or(ConnectorError::Http {
                status: 404,
                message: format!("opportunity '{policy_id}' not found"),
            })
    }

    async fn renewal_pipeline(&self, days_window: u32) -> Result<Vec<Policy>, ConnectorError> {
        let query = format!(
            "SELECT {POLICY_FIELDS} FROM Opportunity \
             WHERE CloseDate = NEXT_N_DAYS:{days_window} \
             AND (Type = 'Renewal' OR StageName LIKE '%Renewal%') \
             ORDER BY CloseDate ASC"
        );
        let body = self.soql(&query).await?;
        let today = chrono::Utc::now().date_naive();
        let policies: Vec<Policy> = body["records"]
            .as_array()
            .map(|rs| {
                rs.iter()
                    .filter_map(|r| {
                        let id = r["Id"].as_str()?;
                        map_opportunity(r, Some(self.record_link(id)), today)
                    })
                    .collect()
            })
            .unwrap_or_default();
        debug!(count = policies.len(), days_window, "salesforce renewal pipeline fetched");
        Ok(policies)
    }
}

#[async_trait::async_trait]
impl Connector for SalesforceConnector {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Recent opportunity activity mentioning `query`, as snippets.
    async fn fetch_snippets(&self, query: &str, limit: usize) -> Result<Vec<Snippet>, ConnectorError> {
        let term: String = query
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == ' ' || *c == '-')
            .collect();
        let soql = format!(
            "SELECT Id, Name, StageName, CloseDate, Amount FROM Opportunity \
             WHERE Name LIKE '%{term}%' ORDER BY CloseDate ASC LIMIT {limit}"
        );
        let body = self.soql(&soql).await?;
        let snippets = body["records"]
            .as_array()
            .map(|rs| {
                rs.iter()
                    .filter_map(|r| {
                        let id = r["Id"].as_str()?.to_string();
                        Some(Snippet {
                            link: Some(self.record_link(&id)),
                            source: Self::NAME.into(),
                            subject: r["Name"].as_str().unwrap_or_default().to_string(),
                            timestamp: r["CloseDate"].as_str().map(String::from),
                            snippet: format!(
                                "{} — closes {}",
                                r["StageName"].as_str().unwrap_or("unknown stage"),
                                r["CloseDate"].as_str().unwrap_or("unknown date"),
                            ),
                            metadata: Default::default(),
                            id,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(snippets)
    }
}
