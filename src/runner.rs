use crate::api_client::{ApiClient, CampaignRef, Login, PartnerPortal, Session};
use crate::config::{Config, Credentials};
use crate::data::{self, convert_rows_to_df, output_schema, OutputRow};
use crate::error::Error;
use datafusion::prelude::SessionContext;
use log::{debug, info, warn};

pub async fn run(config: Config) -> Result<(), Error> {
    let api_client = ApiClient::new(&config)?;
    let credentials = config.credentials();

    let exported =
        export_campaign_metrics(&api_client, &credentials, &config.output_path).await?;

    info!("Wrote {} campaign-day rows to {}", exported, config.output_path);
    Ok(())
}

/// Logs in, walks every vendor account and campaign, and writes the daily CPC
/// metrics of all of them to `output_path` in one go.
///
/// # Returns
/// The number of data rows written. Nothing is written when any step fails.
pub async fn export_campaign_metrics<P: PartnerPortal>(
    portal: &P,
    credentials: &Credentials,
    output_path: &str,
) -> Result<usize, Error> {
    let rows = {
        let Login {
            session,
            account_ids,
        } = portal.authenticate(credentials).await?;
        info!("Discovered {} vendor account(s)", account_ids.len());

        let campaign_refs = discover_campaigns(portal, &session, &account_ids).await;
        info!("Discovered {} campaign(s)", campaign_refs.len());

        collect_rows(portal, &session, &campaign_refs).await?
    };

    let ctx = SessionContext::new();
    let df = convert_rows_to_df(&rows, &ctx, output_schema())?;
    data::save_as_csv(df, output_path).await?;

    Ok(rows.len())
}

async fn discover_campaigns<P: PartnerPortal>(
    portal: &P,
    session: &Session,
    account_ids: &[String],
) -> Vec<CampaignRef> {
    let mut campaign_refs = vec![];

    for account_id in account_ids {
        let campaign_ids = portal.list_campaigns(session, account_id).await;
        debug!("Vendor {} has {} campaign(s)", account_id, campaign_ids.len());

        campaign_refs.extend(campaign_ids.into_iter().map(|campaign_id| CampaignRef {
            account_id: account_id.clone(),
            campaign_id,
        }));
    }

    campaign_refs
}

async fn collect_rows<P: PartnerPortal>(
    portal: &P,
    session: &Session,
    campaign_refs: &[CampaignRef],
) -> Result<Vec<OutputRow>, Error> {
    let mut rows = vec![];

    for campaign_ref in campaign_refs {
        let reported = portal
            .fetch_metrics(session, &campaign_ref.account_id, &campaign_ref.campaign_id)
            .await;

        // one campaign id per request, so only the first entry is meaningful
        let Some(campaign) = reported.into_iter().next() else {
            continue;
        };

        let branch_id = campaign
            .vendor_id
            .ok_or(Error::MalformedRecord { field: "vendorId" })?
            .to_string();
        let daily = campaign
            .cpc_metrics
            .ok_or(Error::MalformedRecord { field: "cpcMetrics" })?;

        if branch_id != campaign_ref.account_id {
            warn!(
                "Campaign {} was listed under vendor {} but reported for vendor {}",
                campaign_ref.campaign_id, campaign_ref.account_id, branch_id
            );
        }

        for day in &daily {
            rows.push(data::flatten(day, &branch_id)?);
        }
        debug!(
            "Campaign {} contributed {} day(s)",
            campaign_ref.campaign_id,
            daily.len()
        );
    }

    Ok(rows)
}
