mod test_nurbs_curve_basic;
mod test_record_basic;
