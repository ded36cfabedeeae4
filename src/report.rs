//! CSV export of precision/recall results, for plotting elsewhere.
use std::io::Write;

use csv;
use failure;

use evaluation::{ModelComparison, PrecisionRecallCurve};
use ModelKind;

#[derive(Serialize)]
struct CurveRow<'a> {
    model: &'a str,
    cutoff: usize,
    precision: f32,
    recall: f32,
}

#[derive(Serialize)]
struct SummaryRow<'a> {
    model: &'a str,
    kind: ModelKind,
    num_users: usize,
    auc: f32,
}

/// Write the points of a single curve as `cutoff,precision,recall` rows.
pub fn write_curve<W: Write>(curve: &PrecisionRecallCurve, writer: W) -> Result<(), failure::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for point in curve.points() {
        writer.serialize(point)?;
    }
    writer.flush()?;

    Ok(())
}

/// Write every point of every compared model as
/// `model,cutoff,precision,recall` rows.
pub fn write_comparison<W: Write>(comparison: &ModelComparison, writer: W) -> Result<(), failure::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for model in comparison.models() {
        for point in model.curve.points() {
            writer.serialize(CurveRow {
                model: &model.name,
                cutoff: point.cutoff,
                precision: point.precision,
                recall: point.recall,
            })?;
        }
    }
    writer.flush()?;

    Ok(())
}

/// Write one `model,kind,num_users,auc` row per compared model.
pub fn write_summary<W: Write>(comparison: &ModelComparison, writer: W) -> Result<(), failure::Error> {
    let mut writer = csv::Writer::from_writer(writer);

    for model in comparison.models() {
        writer.serialize(SummaryRow {
            model: &model.name,
            kind: model.kind,
            num_users: model.curve.num_users(),
            auc: model.auc,
        })?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use data::{Interaction, Interactions};
    use evaluation::{compare, Evaluator, NamedModel, PrecisionRecallPoint};
    use models::popularity::PopularityModel;

    fn comparison() -> ModelComparison {
        let train = Interactions::from(vec![
            Interaction::new(0, 0, None),
            Interaction::new(1, 0, None),
            Interaction::new(1, 1, None),
        ]);
        let test = Interactions::from(vec![Interaction::new(0, 1, None)]);
        let model = PopularityModel::fit(&train).unwrap();
        let models: [NamedModel; 1] = [("popularity", &model)];

        compare(
            &models,
            &train.to_compressed(),
            &test.to_compressed(),
            &Evaluator::new().cutoffs(vec![1, 2]),
        ).unwrap()
    }

    #[test]
    fn curve_rows() {
        let curve = PrecisionRecallCurve::from_points(
            vec![
                PrecisionRecallPoint {
                    cutoff: 2,
                    precision: 0.25,
                    recall: 0.5,
                },
                PrecisionRecallPoint {
                    cutoff: 1,
                    precision: 0.5,
                    recall: 0.25,
                },
            ],
            4,
        );

        let mut buffer = Vec::new();
        write_curve(&curve, &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "cutoff,precision,recall\n1,0.5,0.25\n2,0.25,0.5\n"
        );
    }

    #[test]
    fn comparison_rows() {
        let mut buffer = Vec::new();
        write_comparison(&comparison(), &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "model,cutoff,precision,recall\npopularity,1,1.0,1.0\npopularity,2,0.5,1.0\n"
        );
    }

    #[test]
    fn summary_rows() {
        let mut buffer = Vec::new();
        write_summary(&comparison(), &mut buffer).unwrap();

        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            "model,kind,num_users,auc\npopularity,Popularity,1,0.0\n"
        );
    }
}
