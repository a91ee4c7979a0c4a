#![forbid(unsafe_code)]

use serde::Deserialize;
use serde_json::{json, Value};
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::amount::TokenAmount;
use subsidy_kernel_contracts::ledger::{DailyClaimBatch, LedgerRecord};
use subsidy_kernel_contracts::UnixTimeSec;

use crate::http::{
    build_http_agent, decode_json, engine_error_from_ureq, validate_base_url, EngineError,
    HttpClientConfig,
};

const SERVICE: &str = "subgraph";

/// Page size for cursor pagination; the indexer caps `first` at 1000.
pub const SUBGRAPH_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphConfig {
    pub endpoint: String,
    pub http: HttpClientConfig,
}

/// Blocking GraphQL client for the enrollment/claims indexer.
#[derive(Debug, Clone)]
pub struct SubgraphRuntime {
    endpoint: String,
    agent: ureq::Agent,
}

impl SubgraphRuntime {
    pub fn new(config: &SubgraphConfig) -> Result<Self, EngineError> {
        Ok(Self {
            endpoint: validate_base_url(SERVICE, &config.endpoint)?,
            agent: build_http_agent(SERVICE, &config.http)?,
        })
    }

    pub fn beneficiaries(&self) -> Result<Vec<LedgerRecord>, EngineError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data: BeneficiariesData = self.query(&beneficiaries_query(cursor.as_deref()))?;
            let page_len = data.beneficiaries.len();
            for node in data.beneficiaries {
                out.push(node.into_record()?);
            }
            if page_len < SUBGRAPH_PAGE_SIZE {
                break;
            }
            cursor = out.last().map(|r| r.address.as_str().to_string());
        }
        Ok(out)
    }

    pub fn beneficiary(
        &self,
        address: &BeneficiaryAddress,
    ) -> Result<Option<LedgerRecord>, EngineError> {
        let data: BeneficiaryData = self.query(&beneficiary_query(address))?;
        data.beneficiary.map(BeneficiaryNode::into_record).transpose()
    }

    pub fn daily_claims(&self) -> Result<Vec<DailyClaimBatch>, EngineError> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let data: DailyClaimsData = self.query(&daily_claims_query(cursor.as_deref()))?;
            let page_len = data.daily_claims.len();
            for node in data.daily_claims {
                cursor = Some(node.id.clone());
                out.push(node.into_batch()?);
            }
            if page_len < SUBGRAPH_PAGE_SIZE {
                break;
            }
        }
        Ok(out)
    }

    fn query<T: serde::de::DeserializeOwned>(&self, query: &str) -> Result<T, EngineError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json")
            .send_json(json!({ "query": query }))
            .map_err(|e| engine_error_from_ureq(SERVICE, e))?;
        let envelope: Value = decode_json(SERVICE, response)?;
        unwrap_graphql(envelope)
    }
}

pub fn beneficiaries_query(after: Option<&str>) -> String {
    format!(
        "{{ beneficiaries(first: {SUBGRAPH_PAGE_SIZE}, orderBy: id, orderDirection: asc, \
         where: {{ id_gt: \"{}\" }}) {{ id dateAdded dateRemoved isActive totalClaimed }} }}",
        after.unwrap_or("")
    )
}

pub fn beneficiary_query(address: &BeneficiaryAddress) -> String {
    format!(
        "{{ beneficiary(id: \"{}\") {{ id dateAdded dateRemoved isActive totalClaimed }} }}",
        address.as_str()
    )
}

pub fn daily_claims_query(after: Option<&str>) -> String {
    format!(
        "{{ dailyClaims(first: {SUBGRAPH_PAGE_SIZE}, orderBy: id, orderDirection: asc, \
         where: {{ id_gt: \"{}\" }}) {{ id date beneficiaries }} }}",
        after.unwrap_or("")
    )
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

/// Splits a GraphQL response into its `data` payload or the first reported error.
pub fn unwrap_graphql<T: serde::de::DeserializeOwned>(envelope: Value) -> Result<T, EngineError> {
    let envelope: GraphqlEnvelope =
        serde_json::from_value(envelope).map_err(|e| EngineError::Decode {
            service: SERVICE,
            detail: e.to_string(),
        })?;
    if let Some(first) = envelope.errors.first() {
        return Err(EngineError::Query {
            service: SERVICE,
            message: first.message.clone(),
        });
    }
    let data = envelope.data.ok_or_else(|| EngineError::Decode {
        service: SERVICE,
        detail: "response has neither data nor errors".to_string(),
    })?;
    serde_json::from_value(data).map_err(|e| EngineError::Decode {
        service: SERVICE,
        detail: e.to_string(),
    })
}

// Indexers serialize BigInt as a string; some deployments emit small values as numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum BigIntValue {
    Text(String),
    Number(u64),
}

impl BigIntValue {
    fn to_u64(&self, field: &'static str) -> Result<u64, EngineError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s.trim().parse::<u64>().map_err(|_| EngineError::Decode {
                service: SERVICE,
                detail: format!("{field} is not an unsigned integer: {s:?}"),
            }),
        }
    }

    fn to_amount(&self) -> Result<TokenAmount, EngineError> {
        match self {
            Self::Number(n) => Ok(TokenAmount::from_u128(u128::from(*n))),
            Self::Text(s) => Ok(TokenAmount::from_base_units(s)?),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BeneficiaryNode {
    id: String,
    date_added: BigIntValue,
    date_removed: Option<BigIntValue>,
    is_active: bool,
    total_claimed: BigIntValue,
}

impl BeneficiaryNode {
    fn into_record(self) -> Result<LedgerRecord, EngineError> {
        let date_removed = match &self.date_removed {
            Some(v) => match v.to_u64("dateRemoved")? {
                0 => None,
                secs => Some(UnixTimeSec(secs)),
            },
            None => None,
        };
        Ok(LedgerRecord::v1(
            BeneficiaryAddress::from_canonical(&self.id)?,
            UnixTimeSec(self.date_added.to_u64("dateAdded")?),
            date_removed,
            self.is_active,
            self.total_claimed.to_amount()?,
        )?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressRef {
    Id(String),
    Entity { id: String },
}

impl AddressRef {
    fn as_str(&self) -> &str {
        match self {
            Self::Id(s) | Self::Entity { id: s } => s.as_str(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DailyClaimNode {
    id: String,
    date: BigIntValue,
    #[serde(default)]
    beneficiaries: Vec<AddressRef>,
}

impl DailyClaimNode {
    fn into_batch(self) -> Result<DailyClaimBatch, EngineError> {
        let beneficiaries = self
            .beneficiaries
            .iter()
            .map(|a| BeneficiaryAddress::from_canonical(a.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DailyClaimBatch::v1(
            UnixTimeSec(self.date.to_u64("date")?),
            beneficiaries,
        )?)
    }
}

#[derive(Debug, Deserialize)]
struct BeneficiariesData {
    beneficiaries: Vec<BeneficiaryNode>,
}

#[derive(Debug, Deserialize)]
struct BeneficiaryData {
    beneficiary: Option<BeneficiaryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyClaimsData {
    daily_claims: Vec<DailyClaimNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "0x1111111111111111111111111111111111111111";
    const B: &str = "0x2222222222222222222222222222222222222222";

    #[test]
    fn at_subgraph_01_beneficiaries_page_decodes() {
        let envelope = json!({
            "data": { "beneficiaries": [
                { "id": A, "dateAdded": "1700000000", "dateRemoved": null,
                  "isActive": true, "totalClaimed": "1500000000000000000" },
                { "id": B, "dateAdded": 1700000100, "dateRemoved": "0",
                  "isActive": false, "totalClaimed": "0" }
            ]}
        });
        let data: BeneficiariesData = unwrap_graphql(envelope).unwrap();
        let records: Vec<LedgerRecord> = data
            .beneficiaries
            .into_iter()
            .map(|n| n.into_record().unwrap())
            .collect();
        assert_eq!(records[0].total_claimed.to_token_string(), "1.5");
        assert_eq!(records[0].date_added, UnixTimeSec(1_700_000_000));
        assert_eq!(records[1].date_removed, None);
        assert!(!records[1].is_active);
    }

    #[test]
    fn at_subgraph_02_graphql_errors_surface_as_query_failures() {
        let envelope = json!({ "errors": [{ "message": "indexing_error" }] });
        let out: Result<BeneficiariesData, _> = unwrap_graphql(envelope);
        assert!(matches!(
            out,
            Err(EngineError::Query { message, .. }) if message == "indexing_error"
        ));
    }

    #[test]
    fn at_subgraph_03_non_canonical_ids_are_rejected() {
        let envelope = json!({
            "data": { "beneficiary": {
                "id": "0xABCDEF0123456789ABCDEF0123456789ABCDEF01", "dateAdded": "1",
                "dateRemoved": null, "isActive": true, "totalClaimed": "1"
            }}
        });
        let data: BeneficiaryData = unwrap_graphql(envelope).unwrap();
        assert!(matches!(
            data.beneficiary.map(BeneficiaryNode::into_record).transpose(),
            Err(EngineError::Contract(_))
        ));

        let missing: BeneficiaryData =
            unwrap_graphql(json!({ "data": { "beneficiary": null } })).unwrap();
        assert!(missing.beneficiary.is_none());
    }

    #[test]
    fn at_subgraph_04_daily_claims_accept_plain_and_entity_refs() {
        let envelope = json!({
            "data": { "dailyClaims": [
                { "id": "19700", "date": "1702080000", "beneficiaries": [A, { "id": B }] }
            ]}
        });
        let data: DailyClaimsData = unwrap_graphql(envelope).unwrap();
        let batch = data
            .daily_claims
            .into_iter()
            .next()
            .unwrap()
            .into_batch()
            .unwrap();
        assert_eq!(batch.beneficiaries.len(), 2);
        assert_eq!(batch.date, UnixTimeSec(1_702_080_000));
    }

    #[test]
    fn at_subgraph_05_queries_carry_cursor() {
        assert!(beneficiaries_query(None).contains("id_gt: \"\""));
        assert!(beneficiaries_query(Some(A)).contains(A));
        assert!(daily_claims_query(Some("19700")).contains("id_gt: \"19700\""));
        let a = BeneficiaryAddress::from_canonical(A).unwrap();
        assert!(beneficiary_query(&a).contains(A));
    }
}
