use crate::api_client::DailyMetricRecord;
use crate::error::Error;
use datafusion::arrow::array::{RecordBatch, StringBuilder};
use datafusion::arrow::csv::WriterBuilder;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::prelude::{DataFrame, SessionContext};
use serde_json::{Number, Value};
use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

/// One exported line: a single day of a single campaign. Metric values are the
/// upstream JSON numbers, unchanged; `None` stands for an upstream `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub campaign_date: Option<String>,
    pub orders: Option<Number>,
    pub revenue: Option<Number>,
    pub roi: Option<Number>,
    pub conversion: Option<Number>,
    pub aov: Option<Number>,
    pub clicks: Option<Number>,
    pub bid: Option<Number>,
    pub branch_id: String,
}

///
/// Flattens one raw daily CPC record into an [`OutputRow`].
///
/// # Arguments
/// * `record` - the daily entry as reported upstream
/// * `branch_id` - the vendor id echoed by the report the entry came from
///
/// # Returns
/// A Result containing either the [`OutputRow`] or [`Error::MalformedRecord`] naming
/// the first field that is absent or of an unexpected JSON type. `null` values are
/// kept as empty cells.
pub fn flatten(record: &DailyMetricRecord, branch_id: &str) -> Result<OutputRow, Error> {
    Ok(OutputRow {
        campaign_date: text(record, "startDate")?,
        orders: number(record, "orders")?,
        revenue: number(record, "revenue")?,
        roi: number(record, "returnOnAdSpend")?,
        conversion: number(record, "clicksToOrders")?,
        aov: number(record, "averageOrderValue")?,
        clicks: number(record, "clicks")?,
        bid: number(record, "bid")?,
        branch_id: branch_id.to_string(),
    })
}

fn present<'a>(record: &'a DailyMetricRecord, field: &'static str) -> Result<&'a Value, Error> {
    record.field(field).ok_or(Error::MalformedRecord { field })
}

fn text(record: &DailyMetricRecord, field: &'static str) -> Result<Option<String>, Error> {
    match present(record, field)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text.clone())),
        _ => Err(Error::MalformedRecord { field }),
    }
}

fn number(record: &DailyMetricRecord, field: &'static str) -> Result<Option<Number>, Error> {
    match present(record, field)? {
        Value::Null => Ok(None),
        Value::Number(number) => Ok(Some(number.clone())),
        _ => Err(Error::MalformedRecord { field }),
    }
}

/// Creates the schema of the exported CSV, in column order. Metrics are carried
/// as the text of the upstream number so integers and decimals are written as
/// reported.
pub fn output_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("campaign_date", DataType::Utf8, true),
        Field::new("orders", DataType::Utf8, true),
        Field::new("revenue", DataType::Utf8, true),
        Field::new("roi", DataType::Utf8, true),
        Field::new("conversion", DataType::Utf8, true),
        Field::new("aov", DataType::Utf8, true),
        Field::new("clicks", DataType::Utf8, true),
        Field::new("bid", DataType::Utf8, true),
        Field::new("branch_id", DataType::Utf8, false),
    ]))
}

/// Converts output rows to a DataFrame.
///
/// # Arguments
/// * `rows` - A slice of [`OutputRow`] in export order
/// * `ctx` - A reference to the [`SessionContext`] for DataFrame operations
/// * `schema` - An [`Arc<Schema>`] as returned by [`output_schema`]
///
/// # Returns
/// A Result containing either a [`DataFrame`] or an [`Error`]
pub fn convert_rows_to_df(
    rows: &[OutputRow],
    ctx: &SessionContext,
    schema: Arc<Schema>,
) -> Result<DataFrame, Error> {
    let num_rows = rows.len();
    let column = || StringBuilder::with_capacity(num_rows, num_rows * 8);

    let mut date_builder = column();
    let mut orders_builder = column();
    let mut revenue_builder = column();
    let mut roi_builder = column();
    let mut conversion_builder = column();
    let mut aov_builder = column();
    let mut clicks_builder = column();
    let mut bid_builder = column();
    let mut branch_builder = column();

    for row in rows {
        date_builder.append_option(row.campaign_date.as_deref());
        orders_builder.append_option(row.orders.as_ref().map(Number::to_string));
        revenue_builder.append_option(row.revenue.as_ref().map(Number::to_string));
        roi_builder.append_option(row.roi.as_ref().map(Number::to_string));
        conversion_builder.append_option(row.conversion.as_ref().map(Number::to_string));
        aov_builder.append_option(row.aov.as_ref().map(Number::to_string));
        clicks_builder.append_option(row.clicks.as_ref().map(Number::to_string));
        bid_builder.append_option(row.bid.as_ref().map(Number::to_string));
        branch_builder.append_value(&row.branch_id);
    }

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(date_builder.finish()),
            Arc::new(orders_builder.finish()),
            Arc::new(revenue_builder.finish()),
            Arc::new(roi_builder.finish()),
            Arc::new(conversion_builder.finish()),
            Arc::new(aov_builder.finish()),
            Arc::new(clicks_builder.finish()),
            Arc::new(bid_builder.finish()),
            Arc::new(branch_builder.finish()),
        ],
    )?;

    Ok(ctx.read_batch(batch)?)
}

/// Writes the DataFrame to `path` as a single CSV file with a header row,
/// replacing any previous file. An empty DataFrame yields a header-only file.
///
/// # Arguments
/// * `df` - The DataFrame to be written
/// * `path` - Target file; missing parent directories are created
///
/// # Returns
/// A Result containing either `()` or an [`Error`]
pub async fn save_as_csv(df: DataFrame, path: &str) -> Result<(), Error> {
    let schema = Arc::clone(df.schema().inner());
    let batches: Vec<RecordBatch> = df.collect().await?;

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);

    // the header is emitted with the first batch written
    writer.write(&RecordBatch::new_empty(schema))?;
    for batch in &batches {
        writer.write(batch)?;
    }

    Ok(())
}
